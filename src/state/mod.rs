//! State module for the crawl job model
//!
//! This module provides the values the queue tracks and the snapshot persists.
//!
//! # Components
//!
//! - `Job`, `PageJob`, `FileJob`: the units of crawl work
//! - `RelativePath`: where a file job writes below the output root
//! - `JobStatus`, `QueueState`: the pending/done bookkeeping of a queue

mod job;
mod path;
mod queue_state;

// Re-export main types
pub use job::{FileJob, Job, PageJob};
pub use path::{PathError, RelativePath};
pub use queue_state::{count_pending, pick_resume_page, JobStatus, QueueState};
