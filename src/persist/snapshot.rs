//! Snapshot encoding, atomic writes, and startup loading.
//!
//! A snapshot is a JSON document carrying a format-version marker and one
//! record per live entry (key, value bytes, optional absolute expiration in
//! epoch milliseconds). Writes go to `<path>.tmp` first and are renamed
//! over the canonical file only once fully flushed, so a crash mid-save can
//! never leave a torn snapshot under the canonical name.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::storage::Entry;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors from snapshot save/load.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Disk-level failure (permissions, disk full, ...).
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot file exists but does not decode as a snapshot.
    #[error("snapshot is corrupt: {0}")]
    Corrupt(String),

    /// The snapshot decodes but was written by an unknown format version.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

/// The on-disk snapshot document.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    saved_at_ms: u64,
    entries: Vec<SnapshotRecord>,
}

/// One persisted entry.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    key: String,
    value: Vec<u8>,
    /// Absolute expiration in milliseconds since the Unix epoch;
    /// `None` means the entry never expires.
    expires_at_ms: Option<u64>,
}

impl SnapshotRecord {
    fn from_entry(key: String, entry: &Entry) -> Self {
        Self {
            key,
            value: entry.value.to_vec(),
            expires_at_ms: entry.expires_at.and_then(epoch_ms),
        }
    }

    fn into_entry(self) -> (String, Entry) {
        let expires_at = self
            .expires_at_ms
            .map(|ms| UNIX_EPOCH + Duration::from_millis(ms));
        (
            self.key,
            Entry {
                value: Bytes::from(self.value),
                expires_at,
            },
        )
    }
}

fn epoch_ms(t: SystemTime) -> Option<u64> {
    t.duration_since(UNIX_EPOCH).ok().map(|d| d.as_millis() as u64)
}

/// Serializes `entries` and atomically replaces the snapshot at `path`.
pub fn write_snapshot(entries: &[(String, Entry)], path: &Path) -> Result<(), PersistError> {
    let file = SnapshotFile {
        version: SNAPSHOT_VERSION,
        saved_at_ms: epoch_ms(SystemTime::now()).unwrap_or(0),
        entries: entries
            .iter()
            .map(|(key, entry)| SnapshotRecord::from_entry(key.clone(), entry))
            .collect(),
    };

    let encoded =
        serde_json::to_vec(&file).map_err(|e| PersistError::Corrupt(e.to_string()))?;

    let tmp = tmp_path(path);
    {
        let mut out = File::create(&tmp)?;
        out.write_all(&encoded)?;
        out.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads the snapshot at `path`.
///
/// Returns `Ok(None)` if no snapshot exists (a fresh start, not an error).
/// A file that cannot be decoded yields [`PersistError::Corrupt`]; an
/// unknown version marker yields [`PersistError::UnsupportedVersion`]. The
/// caller decides how to degrade — at startup both mean "warn and start
/// empty".
pub fn read_snapshot(path: &Path) -> Result<Option<Vec<(String, Entry)>>, PersistError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let file: SnapshotFile =
        serde_json::from_slice(&raw).map_err(|e| PersistError::Corrupt(e.to_string()))?;

    if file.version != SNAPSHOT_VERSION {
        return Err(PersistError::UnsupportedVersion(file.version));
    }

    Ok(Some(
        file.entries
            .into_iter()
            .map(SnapshotRecord::into_entry)
            .collect(),
    ))
}

/// Sibling temp path for the write-then-rename dance.
fn tmp_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
