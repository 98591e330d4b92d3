//! Crawl engine - per-job processing and run orchestration
//!
//! This module contains the logic that ties the pieces of a download together:
//! - Starting a fresh run or rebuilding one from a snapshot
//! - Fetching and parsing pages, then enqueuing what the crawler finds
//! - Writing files below the run directory
//! - Running the worker pool until the queue is quiescent or shutdown is requested
//! - Persisting the queue state at the end of every run

use crate::crawler::fetcher::{fetch_with_retry, FetchError, RetryPolicy, Transport};
use crate::crawler::parser::parse_document;
use crate::crawler::pool::WorkerPool;
use crate::crawler::queue::DedupQueue;
use crate::output::{log_statistics, CrawlStatistics, CrawlStats};
use crate::sites::{Crawler, CrawlerRegistry, ExtractError};
use crate::state::{count_pending, pick_resume_page, FileJob, Job, JobStatus, PageJob};
use crate::storage::{load_snapshot, save_snapshot, snapshot_exists};
use crate::ComicError;
use reqwest::header::HeaderMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use url::Url;

/// Why a single job failed
///
/// Job errors are logged and counted by the engine; they never end a run.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// Returns true if a later run may succeed where this one failed
    ///
    /// Network errors that outlasted the retry policy and truncated downloads
    /// qualify; HTTP status and extraction errors do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(FetchError::Status { .. }) => false,
            Self::Fetch(_) => true,
            Self::Extract(_) | Self::Io(_) => false,
        }
    }
}

/// What handling a job amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// A page was parsed; counts are of newly enqueued jobs
    PageParsed { pages: usize, files: usize },

    /// A file was fetched and written
    Downloaded(PathBuf),

    /// The file was already present and was not fetched
    AlreadyPresent(PathBuf),
}

/// Result of `Engine::run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Whether the run stopped on a shutdown request instead of quiescence
    pub interrupted: bool,

    /// Counters of the run
    pub stats: CrawlStatistics,

    /// Where the final snapshot was written
    pub state_file: PathBuf,
}

/// One download: a crawler, its queue and its run directory
///
/// Cloning is cheap; clones share the queue, the transport and the counters.
#[derive(Clone)]
pub struct Engine {
    crawler: Arc<dyn Crawler>,
    queue: Arc<DedupQueue>,
    transport: Arc<dyn Transport>,
    directory: PathBuf,
    retry: RetryPolicy,
    headers: HeaderMap,
    stats: Arc<CrawlStats>,

    /// Failed jobs to record as pending in the snapshot
    retry_later: Arc<Mutex<Vec<Job>>>,
}

impl Engine {
    fn with_queue(
        crawler: Arc<dyn Crawler>,
        queue: DedupQueue,
        transport: Arc<dyn Transport>,
        directory: PathBuf,
        retry: RetryPolicy,
    ) -> Self {
        let headers = crawler.headers();
        Self {
            crawler,
            queue: Arc::new(queue),
            transport,
            directory,
            retry,
            headers,
            stats: Arc::new(CrawlStats::new()),
            retry_later: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Prepares a fresh download of `url` into `directory`
    ///
    /// # Returns
    ///
    /// * `Ok(Engine)` - Engine whose queue holds `PageJob(url)`
    /// * `Err(ComicError::SnapshotExists)` - The directory belongs to an earlier run
    /// * `Err(ComicError::NoCrawlerAvailable)` - No crawler handles the URL's host
    pub fn start(
        registry: &CrawlerRegistry,
        url: Url,
        directory: impl Into<PathBuf>,
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
    ) -> crate::Result<Self> {
        let directory = directory.into();
        if snapshot_exists(&directory) {
            return Err(ComicError::SnapshotExists(directory));
        }

        let crawler = registry.find_crawler(&url)?;
        tracing::info!(
            "Downloading {} with the {} crawler into {}",
            url,
            crawler.name(),
            directory.display()
        );

        let queue = DedupQueue::new();
        queue.put(PageJob::new(url).into());

        Ok(Self::with_queue(crawler, queue, transport, directory, retry))
    }

    /// Rebuilds an engine from the snapshot in `directory`
    ///
    /// The resume page is the first pending page of the snapshot, or its first
    /// page if none is pending; a crawler may override that choice. The resume
    /// page is taken out of the restored state before it is put back, so the
    /// queue's dedup does not swallow it.
    ///
    /// # Returns
    ///
    /// * `Ok(Engine)` - Engine ready to `run`
    /// * `Err(ComicError::Storage)` - No snapshot, or an unreadable one (left untouched)
    /// * `Err(ComicError::NothingToResume)` - The snapshot holds no page
    /// * `Err(ComicError::NoCrawlerAvailable)` - No crawler handles the resume page
    pub fn load(
        registry: &CrawlerRegistry,
        directory: impl Into<PathBuf>,
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
    ) -> crate::Result<Self> {
        let directory = directory.into();
        let snapshot = load_snapshot(&directory)?;
        let mut state = snapshot.state;

        let Some(candidate) = pick_resume_page(&state) else {
            return Err(ComicError::NothingToResume(directory));
        };
        let crawler = registry.find_crawler(&candidate.url)?;
        let resume = crawler.resume_page(&state).unwrap_or(candidate);

        let resume_job = Job::Page(resume);
        state.remove(&resume_job);

        tracing::info!(
            "Resuming {} from {} (snapshot of {}, {} of {} other jobs pending)",
            directory.display(),
            resume_job.url(),
            snapshot.created_at.to_rfc3339(),
            count_pending(&state),
            state.len()
        );

        let queue = DedupQueue::restore(state);
        queue.put(resume_job);

        Ok(Self::with_queue(crawler, queue, transport, directory, retry))
    }

    pub fn crawler(&self) -> &dyn Crawler {
        self.crawler.as_ref()
    }

    pub fn queue(&self) -> &DedupQueue {
        &self.queue
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Current counters of this engine
    pub fn stats(&self) -> CrawlStatistics {
        self.stats.snapshot()
    }

    /// Runs `concurrency` workers until the queue is quiescent
    pub async fn run(&self, concurrency: usize) -> crate::Result<RunSummary> {
        self.run_until(concurrency, std::future::pending()).await
    }

    /// Runs `concurrency` workers until the queue is quiescent or `shutdown` completes
    ///
    /// Either way the workers are cancelled, each finishes the job it holds,
    /// and the queue state is written to the run directory.
    pub async fn run_until<F>(&self, concurrency: usize, shutdown: F) -> crate::Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let pool = WorkerPool::spawn(self, concurrency);

        let interrupted = tokio::select! {
            _ = self.queue.join() => false,
            _ = shutdown => true,
        };

        if interrupted {
            tracing::warn!("Shutdown requested, waiting for running jobs to finish");
        } else {
            tracing::info!("All jobs handled");
        }

        pool.shutdown().await;
        let state_file = self.dump()?;

        let stats = self.stats();
        log_statistics(&stats);

        Ok(RunSummary {
            interrupted,
            stats,
            state_file,
        })
    }

    /// Writes the queue state to the run directory
    ///
    /// Drains the queue's pending jobs, so this ends the run. Jobs that failed
    /// with a retryable error are stored as pending so `resume` tries them again.
    pub fn dump(&self) -> crate::Result<PathBuf> {
        let mut state = self.queue.snapshot();
        let retry_later = self
            .retry_later
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for job in retry_later.iter() {
            state.insert(job.clone(), JobStatus::Pending);
        }
        drop(retry_later);

        let path = save_snapshot(&self.directory, &state)?;
        tracing::info!("Saved state to {}", path.display());
        Ok(path)
    }

    /// Processes one retrieved job and marks it done
    ///
    /// The job runs in its own task, so a panicking extraction function is
    /// reported as a failed job. Nothing escapes this call.
    pub(crate) async fn handle(&self, job: Job) {
        let task = {
            let engine = self.clone();
            let job = job.clone();
            tokio::spawn(async move { engine.process(&job).await })
        };

        match task.await {
            Ok(Ok(outcome)) => self.record(&job, outcome),
            Ok(Err(e)) => {
                self.stats.record_failure();
                tracing::error!("Failed {}: {}", job, e);
                if e.is_retryable() {
                    self.retry_later
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(job.clone());
                }
            }
            Err(e) => {
                self.stats.record_failure();
                tracing::error!("Aborted {}: {}", job, e);
            }
        }

        self.queue.task_done(&job);
    }

    fn record(&self, job: &Job, outcome: JobOutcome) {
        match outcome {
            JobOutcome::PageParsed { pages, files } => {
                self.stats.record_page((pages + files) as u64);
                tracing::info!(
                    "Parsed {} ({} new pages, {} new files)",
                    job.url(),
                    pages,
                    files
                );
            }
            JobOutcome::Downloaded(path) => {
                self.stats.record_download();
                tracing::info!("Downloaded {}", path.display());
            }
            JobOutcome::AlreadyPresent(path) => {
                self.stats.record_skip();
                tracing::debug!("Skipping {}, file already exists", path.display());
            }
        }
    }

    /// Processes one job without touching the queue's done bookkeeping
    pub async fn process(&self, job: &Job) -> Result<JobOutcome, JobError> {
        tracing::debug!("Processing {}", job);
        match job {
            Job::Page(page) => self.handle_page(page).await,
            Job::File(file) => self.handle_file(file).await,
        }
    }

    async fn handle_page(&self, page: &PageJob) -> Result<JobOutcome, JobError> {
        let body = fetch_with_retry(self.transport.as_ref(), &page.url, &self.headers, self.retry)
            .await?;
        let (pages, files) = self.extract(&body, &page.url)?;

        // Pages before files, each in extraction order
        let mut new_pages = 0;
        for next in pages {
            if self.queue.put(next.into()) {
                new_pages += 1;
            }
        }

        let mut new_files = 0;
        for file in files {
            if self.queue.put(file.into()) {
                new_files += 1;
            }
        }

        Ok(JobOutcome::PageParsed {
            pages: new_pages,
            files: new_files,
        })
    }

    fn extract(
        &self,
        body: &[u8],
        page_url: &Url,
    ) -> Result<(Vec<PageJob>, Vec<FileJob>), ExtractError> {
        let document = parse_document(body);
        let pages = self.crawler.extract_pages(&document, page_url)?;
        let files = self.crawler.extract_files(&document, page_url)?;
        Ok((pages, files))
    }

    async fn handle_file(&self, file: &FileJob) -> Result<JobOutcome, JobError> {
        let target = file.path.resolve(&self.directory);
        if tokio::fs::try_exists(&target).await? {
            return Ok(JobOutcome::AlreadyPresent(target));
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = fetch_with_retry(self.transport.as_ref(), &file.url, &self.headers, self.retry)
            .await?;

        let part = part_path(&target);
        if let Err(e) = write_atomically(&part, &target, &body).await {
            if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                tracing::debug!("Could not remove {}: {}", part.display(), cleanup);
            }
            return Err(e.into());
        }

        Ok(JobOutcome::Downloaded(target))
    }
}

/// Sibling path a download is written to before it is complete
fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn write_atomically(part: &Path, target: &Path, body: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(part, body).await?;
    tokio::fs::rename(part, target).await
}
