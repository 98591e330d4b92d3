//! Storage module for persisting crawl state
//!
//! This module handles the snapshot file of a run directory:
//! - Writing the queue state at the end of every run
//! - Reading it back for a resumed run
//! - Detecting missing and corrupt snapshots

mod snapshot;

pub use snapshot::{
    load_snapshot, save_snapshot, snapshot_exists, state_file, Snapshot, STATE_FILE_NAME,
};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No state file found at {}", .0.display())]
    NoStateFile(PathBuf),

    #[error("State file {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
