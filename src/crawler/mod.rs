//! Crawler module for the download engine
//!
//! This module contains the core crawling logic, including:
//! - The deduplicating job queue shared by all workers
//! - HTTP fetching with retry logic
//! - HTML parsing helpers for crawler variants
//! - The worker pool and overall run coordination

mod coordinator;
mod fetcher;
pub mod parser;
mod pool;
mod queue;

pub use coordinator::{Engine, JobError, JobOutcome, RunSummary};
pub use fetcher::{
    build_http_client, fetch_with_retry, FetchError, HttpTransport, RetryPolicy, Transport,
};
pub use pool::WorkerPool;
pub use queue::DedupQueue;
