//! Durable credential store for one platform account.
//!
//! The store is a directory holding one JSON record per account identity.
//! The record's contents are opaque — whatever blob the transport hands
//! over on pairing or rotation is written back verbatim on the next
//! `load`. Writes go through a temp file + rename so a crash mid-save
//! never leaves a half-written record.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use drip_core::errors::StoreError;

/// Opaque credential blob issued by the platform.
///
/// drip never inspects the contents; it only round-trips them between the
/// transport and disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials(pub serde_json::Value);

/// Filesystem-backed credential store keyed by one fixed account identity.
#[derive(Debug)]
pub struct CredentialStore {
    dir: PathBuf,
    account: String,
}

impl CredentialStore {
    /// Open (creating if needed) the store directory.
    ///
    /// Failure here is unrecoverable — callers abort startup rather than
    /// run without durable credentials.
    pub fn open(dir: impl Into<PathBuf>, account: impl Into<String>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir,
            account: account.into(),
        })
    }

    fn record_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.account))
    }

    /// Load stored credentials, if any.
    ///
    /// A missing record is `Ok(None)` — the normal state before first
    /// pairing. A present but unparseable record is an error.
    pub fn load(&self) -> Result<Option<Credentials>, StoreError> {
        let path = self.record_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(account = %self.account, "no stored credentials");
                return Ok(None);
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        let creds = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupted {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(creds))
    }

    /// Persist credentials, replacing any previous record.
    ///
    /// Idempotent: saving the same blob twice is harmless. Called on
    /// initial pairing and on every rotation event while connected.
    pub fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let path = self.record_path();
        let tmp = self.dir.join(format!("{}.json.tmp", self.account));
        let body = serde_json::to_vec_pretty(&credentials.0).map_err(|e| {
            StoreError::Corrupted {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        write_atomic(&tmp, &path, &body)?;
        info!(account = %self.account, "credentials persisted");
        Ok(())
    }

    /// Remove the stored record.
    ///
    /// Used after an unrecoverable disconnect so the next start re-enters
    /// pairing instead of retrying dead credentials.
    pub fn wipe(&self) -> Result<(), StoreError> {
        let path = self.record_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(account = %self.account, "credentials wiped");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

fn write_atomic(tmp: &Path, dest: &Path, body: &[u8]) -> Result<(), StoreError> {
    std::fs::write(tmp, body).map_err(|source| StoreError::Io {
        path: tmp.display().to_string(),
        source,
    })?;
    std::fs::rename(tmp, dest).map_err(|source| StoreError::Io {
        path: dest.display().to_string(),
        source,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
