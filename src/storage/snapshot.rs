//! Snapshot file reading and writing
//!
//! The snapshot is a JSON document holding every job the queue has seen and
//! whether it is still pending. A SHA-256 checksum over the entries notices
//! edits made outside comic-dl. An edited file that still parses and passes
//! validation is loaded with a warning, so a status can be flipped by hand;
//! truncated or malformed files fail loudly instead of resuming an empty or
//! partial crawl.

use crate::state::{Job, JobStatus, QueueState};
use crate::storage::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name of the snapshot file inside a run directory
pub const STATE_FILE_NAME: &str = "state.json";

/// Current on-disk format version
const FORMAT_VERSION: u32 = 1;

/// One job and its status, as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StateEntry {
    job: Job,
    status: JobStatus,
}

/// Top-level layout of the snapshot file
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    format: u32,
    created_at: DateTime<Utc>,
    checksum: String,
    entries: Vec<StateEntry>,
}

/// A loaded snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// When the snapshot was written
    pub created_at: DateTime<Utc>,

    /// The queue state at that moment
    pub state: QueueState,
}

/// Path of the snapshot file for a run directory
pub fn state_file(directory: &Path) -> PathBuf {
    directory.join(STATE_FILE_NAME)
}

/// Returns whether a run directory already holds a snapshot
pub fn snapshot_exists(directory: &Path) -> bool {
    state_file(directory).exists()
}

fn checksum(entries: &[StateEntry]) -> StorageResult<String> {
    let bytes = serde_json::to_vec(entries)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Writes the queue state of a run
///
/// The file is written next to its final location and renamed into place, so
/// an existing snapshot is only ever replaced by a complete one.
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written snapshot
/// * `Err(StorageError)` - Failed to serialize or write the file
pub fn save_snapshot(directory: &Path, state: &QueueState) -> StorageResult<PathBuf> {
    std::fs::create_dir_all(directory)?;

    let entries: Vec<StateEntry> = state
        .iter()
        .map(|(job, status)| StateEntry {
            job: job.clone(),
            status: *status,
        })
        .collect();

    let file = SnapshotFile {
        format: FORMAT_VERSION,
        created_at: Utc::now(),
        checksum: checksum(&entries)?,
        entries,
    };

    let path = state_file(directory);
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, serde_json::to_vec_pretty(&file)?)?;
    std::fs::rename(&tmp_path, &path)?;

    tracing::debug!("Saved {} jobs to {}", file.entries.len(), path.display());
    Ok(path)
}

/// Reads the snapshot of a run directory
///
/// The file is never modified, even when it turns out to be unusable.
///
/// # Returns
///
/// * `Ok(Snapshot)` - The stored queue state
/// * `Err(StorageError::NoStateFile)` - The directory has no snapshot
/// * `Err(StorageError::Corrupt)` - The file exists but cannot be trusted
pub fn load_snapshot(directory: &Path) -> StorageResult<Snapshot> {
    let path = state_file(directory);

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NoStateFile(path)),
        Err(e) => return Err(e.into()),
    };

    let corrupt = |reason: String| StorageError::Corrupt {
        path: path.clone(),
        reason,
    };

    let file: SnapshotFile =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(format!("invalid JSON: {}", e)))?;

    if file.format != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {} (expected {})",
            file.format, FORMAT_VERSION
        )));
    }

    let edited = checksum(&file.entries)? != file.checksum;

    let mut state = QueueState::new();
    for entry in file.entries {
        if state.insert(entry.job.clone(), entry.status).is_some() {
            return Err(corrupt(format!("duplicate entry for {}", entry.job)));
        }
    }

    if edited {
        tracing::warn!(
            "{} was edited outside comic-dl (checksum mismatch); loading it anyway",
            path.display()
        );
    }

    Ok(Snapshot {
        created_at: file.created_at,
        state,
    })
}
