//! # drip-settings
//!
//! Layered configuration for the drip sender.
//!
//! Values resolve in three layers: compiled defaults, then
//! `~/.drip/settings.json` deep-merged on top, then `DRIP_*` environment
//! variables (with `PORT` accepted as a fallback for the listen port, the
//! original deployment contract). The merged result is cached process-wide
//! behind [`get_settings`]; the binary seeds the cache with
//! [`init_settings`] after resolving its `--settings` flag so every later
//! reader sees the same file startup used.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::Arc;

use parking_lot::RwLock;

/// Cached settings snapshot, filled on first access or by [`init_settings`].
static SETTINGS: RwLock<Option<Arc<DripSettings>>> = RwLock::new(None);

/// The process-wide settings snapshot.
///
/// Loads from the default path on first use. A load failure logs a warning
/// and falls back to compiled defaults rather than aborting — a sender
/// with default knobs beats one that refuses to start over a settings
/// typo it already reported. Callers hold an `Arc` snapshot, so a
/// concurrent [`init_settings`] never changes values they already read.
pub fn get_settings() -> Arc<DripSettings> {
    if let Some(s) = SETTINGS.read().as_ref() {
        return Arc::clone(s);
    }

    let mut guard = SETTINGS.write();
    // Another caller may have filled the cache while we waited.
    if let Some(s) = guard.as_ref() {
        return Arc::clone(s);
    }

    let settings = Arc::new(load_settings().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "settings load failed, using defaults");
        DripSettings::default()
    }));
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Seed the cache with an already-loaded value, replacing any previous one.
pub fn init_settings(settings: DripSettings) {
    *SETTINGS.write() = Some(Arc::new(settings));
}

/// Empty the cache so the next [`get_settings`] loads fresh (test-only).
#[cfg(test)]
pub(crate) fn reset_settings() {
    *SETTINGS.write() = None;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// The SETTINGS static is shared across the parallel test threads;
    /// tests that touch it serialize on this lock.
    static SETTINGS_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn with_port(port: u16) -> DripSettings {
        let mut s = DripSettings::default();
        s.server.port = port;
        s
    }

    #[test]
    fn init_settings_seeds_the_cache() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        init_settings(with_port(9999));
        assert_eq!(get_settings().server.port, 9999);
        reset_settings();
    }

    #[test]
    fn init_settings_replaces_previous() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        init_settings(with_port(1111));
        assert_eq!(get_settings().server.port, 1111);

        init_settings(with_port(2222));
        assert_eq!(get_settings().server.port, 2222);
        reset_settings();
    }

    #[test]
    fn held_snapshot_survives_a_replacement() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        init_settings(with_port(3333));
        let held = get_settings();

        init_settings(with_port(4444));
        assert_eq!(held.server.port, 3333);
        assert_eq!(get_settings().server.port, 4444);
        reset_settings();
    }
}
