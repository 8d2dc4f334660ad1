//! Shared error taxonomy.
//!
//! Transport-level failures stay inside the session crate and surface only
//! as state changes; the errors here are the ones that cross component
//! boundaries — dispatch validation and credential-store I/O.

use thiserror::Error;

/// Errors surfaced synchronously when starting or running a dispatch job.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Bad dispatch parameters (empty batch, unparseable input).
    #[error("invalid dispatch request: {0}")]
    Validation(String),

    /// A dispatch job is already running; cancel it first.
    #[error("a dispatch job is already active")]
    Conflict,

    /// Send requested while the session is not connected.
    #[error("session is not connected")]
    SessionUnavailable,
}

/// Credential store failures.
///
/// Unrecoverable at startup — the process aborts rather than running
/// without durable credentials.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure reading or writing the store.
    #[error("credential store I/O at {path}: {source}")]
    Io {
        /// Path involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Stored credentials exist but cannot be parsed.
    #[error("corrupted credentials at {path}: {reason}")]
    Corrupted {
        /// Path involved.
        path: String,
        /// Parse error description.
        reason: String,
    },
}
