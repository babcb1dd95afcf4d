//! Durable record of blocked accounts.
//!
//! One JSON file per blocked account under the store root, named by the SHA-256 of the
//! normalised (trimmed, lower-cased) email:
//!
//! ```text
//! <root>/<sha256-hex>.json
//! ```
//!
//! A record is written to a temporary file in the store root and then linked into place
//! without clobbering, so a reader only ever sees a complete record. Marking the same
//! account twice leaves the original record untouched. A record that is present but
//! unreadable is replaced.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedAccountRecord {
    pub email: String,
    pub blocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BlockedAccountStore {
    root: PathBuf,
}

impl BlockedAccountStore {
    /// Opens the store, creating its directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(StoreError::DirCreation)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Records that the account owning `email` was blocked.
    ///
    /// # Returns
    ///
    /// `true` if a new record was written, `false` if the account was already recorded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyEmail`] for a blank email and I/O or serialisation errors
    /// otherwise.
    pub fn mark_account_as_blocked(
        &self,
        email: &str,
        blocked_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let email = normalise(email)?;
        let record = BlockedAccountRecord {
            email: email.clone(),
            blocked_at,
        };
        let contents = serde_json::to_vec_pretty(&record).map_err(StoreError::Serialization)?;
        let path = self.record_path(&email);

        let mut file = NamedTempFile::new_in(&self.root).map_err(StoreError::FileWrite)?;
        file.write_all(&contents).map_err(StoreError::FileWrite)?;
        file.as_file().sync_all().map_err(StoreError::FileWrite)?;

        let existing = match file.persist_noclobber(&path) {
            Ok(_) => return Ok(true),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => e.file,
            Err(e) => return Err(StoreError::FileWrite(e.error)),
        };
        match self.read_record(&path) {
            Ok(Some(_)) => Ok(false),
            Ok(None) | Err(StoreError::Serialization(_)) => {
                tracing::warn!(
                    path = %path.display(),
                    "replacing unreadable blocked account record"
                );
                existing
                    .persist(&path)
                    .map_err(|e| StoreError::FileWrite(e.error))?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a readable record exists for `email`.
    pub fn is_blocked(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.record(email)?.is_some())
    }

    pub fn record(&self, email: &str) -> Result<Option<BlockedAccountRecord>, StoreError> {
        let email = normalise(email)?;
        self.read_record(&self.record_path(&email))
    }

    fn read_record(&self, path: &Path) -> Result<Option<BlockedAccountRecord>, StoreError> {
        let contents = match fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::FileRead(e)),
        };
        serde_json::from_slice(&contents)
            .map(Some)
            .map_err(StoreError::Serialization)
    }

    fn record_path(&self, normalised_email: &str) -> PathBuf {
        let digest = Sha256::digest(normalised_email.as_bytes());
        self.root.join(format!("{}.json", hex::encode(digest)))
    }
}

fn normalise(email: &str) -> Result<String, StoreError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(StoreError::EmptyEmail);
    }
    Ok(email)
}
