//! Output module for crawl reporting
//!
//! This module handles:
//! - Counting what a run did (pages, downloads, skips, failures)
//! - Reporting those counts when a run ends

pub mod stats;

pub use stats::{log_statistics, CrawlStatistics, CrawlStats};
