//! Recipient identifier (JID) normalization.
//!
//! The platform addresses individual chats as `<number>@s.whatsapp.net`.
//! Operators usually type a bare number; sends must always go to the full
//! JID, and an identifier that already carries the suffix passes through
//! untouched.

/// Canonical domain suffix for individual-chat JIDs.
pub const CANONICAL_SUFFIX: &str = "@s.whatsapp.net";

/// Normalize a recipient identifier to a full JID.
///
/// Trims surrounding whitespace. If the identifier already contains the
/// canonical suffix it is used as-is; otherwise the suffix is appended.
#[must_use]
pub fn normalize_recipient(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains(CANONICAL_SUFFIX) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{CANONICAL_SUFFIX}")
    }
}
