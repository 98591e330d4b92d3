//! Statistics collected while a crawl runs
//!
//! Workers bump shared atomic counters; a plain `CrawlStatistics` copy is
//! taken for reporting at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by all workers of one engine
#[derive(Debug, Default)]
pub struct CrawlStats {
    pages_parsed: AtomicU64,
    files_downloaded: AtomicU64,
    files_skipped: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_discovered: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Page jobs fetched and parsed successfully
    pub pages_parsed: u64,

    /// File jobs fetched and written
    pub files_downloaded: u64,

    /// File jobs whose target already existed
    pub files_skipped: u64,

    /// Jobs of either kind that failed
    pub jobs_failed: u64,

    /// New jobs enqueued by page extraction
    pub jobs_discovered: u64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page(&self, discovered: u64) {
        self.pages_parsed.fetch_add(1, Ordering::Relaxed);
        self.jobs_discovered.fetch_add(discovered, Ordering::Relaxed);
    }

    pub fn record_download(&self) {
        self.files_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counter values
    pub fn snapshot(&self) -> CrawlStatistics {
        CrawlStatistics {
            pages_parsed: self.pages_parsed.load(Ordering::Relaxed),
            files_downloaded: self.files_downloaded.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_discovered: self.jobs_discovered.load(Ordering::Relaxed),
        }
    }
}

impl CrawlStatistics {
    /// Total number of jobs handled, successful or not
    pub fn jobs_handled(&self) -> u64 {
        self.pages_parsed + self.files_downloaded + self.files_skipped + self.jobs_failed
    }
}

/// Logs statistics at the end of a run
pub fn log_statistics(stats: &CrawlStatistics) {
    tracing::info!(
        "Pages parsed: {}, files downloaded: {}, files already present: {}, failed jobs: {}",
        stats.pages_parsed,
        stats.files_downloaded,
        stats.files_skipped,
        stats.jobs_failed
    );

    if stats.jobs_failed > 0 {
        tracing::warn!(
            "{} of {} jobs failed; run 'resume' later to retry pages that were not reached",
            stats.jobs_failed,
            stats.jobs_handled()
        );
    }
}
