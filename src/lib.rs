//! comic-dl: a resumable downloader for web comics and manga
//!
//! This crate walks the pages of a comic site with a pool of workers, downloads
//! every image it finds into a local directory, and snapshots its queue so an
//! interrupted download can pick up where it stopped.

pub mod config;
pub mod crawler;
pub mod output;
pub mod sites;
pub mod state;
pub mod storage;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for comic-dl operations
#[derive(Debug, Error)]
pub enum ComicError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No crawler available for host '{host}'")]
    NoCrawlerAvailable { host: String },

    #[error("A download already exists in {}; use 'resume' instead", .0.display())]
    SnapshotExists(PathBuf),

    #[error("Nothing to resume in {}: the snapshot holds no pages", .0.display())]
    NothingToResume(PathBuf),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for comic-dl operations
pub type Result<T> = std::result::Result<T, ComicError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Engine, RunSummary};
pub use sites::{Crawler, CrawlerRegistry};
pub use state::{FileJob, Job, PageJob};
