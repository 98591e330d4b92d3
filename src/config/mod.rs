//! Configuration module for comic-dl
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file.
//!
//! # Example
//!
//! ```no_run
//! use comic_dl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("comic-dl.toml")).unwrap();
//! println!("Downloading with {} workers", config.download.jobs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, DownloadConfig, HttpConfig};

// Re-export parser functions
pub use parser::{load_config, load_config_str};
pub use validation::{validate_jobs, MAX_JOBS};
