//! Deduplicating work queue shared by all workers
//!
//! This module handles:
//! - Remembering every job ever enqueued so a job is queued at most once per run
//! - Handing jobs to workers, waiting (not spinning) while the queue is empty
//! - Tracking unfinished work so the pool can wait for quiescence
//! - Capturing and restoring the pending/done state for snapshots

use crate::state::{Job, JobStatus, QueueState};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Bookkeeping guarded by the queue's lock
#[derive(Debug, Default)]
struct QueueInner {
    /// Every job ever accepted by `put` or `restore`
    seen: HashSet<Job>,

    /// Jobs waiting to be retrieved, in enqueue order
    pending: VecDeque<Job>,

    /// Jobs handed out by `get` and not yet marked with `task_done`
    in_flight: HashSet<Job>,

    /// Pending jobs removed by `snapshot`; never handed out, never done
    drained: HashSet<Job>,

    /// Pending plus in-flight jobs
    unfinished: usize,
}

/// A blocking FIFO queue that ignores jobs it has already seen
///
/// Dedup is by first sight: once a job has been accepted, putting it again
/// is a no-op for the rest of the queue's life, whether the job is still
/// pending or long done.
#[derive(Debug, Default)]
pub struct DedupQueue {
    inner: Mutex<QueueInner>,

    /// Signalled when a job becomes available
    available: Notify,

    /// Signalled when the unfinished count drops to zero
    idle: Notify,
}

impl DedupQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a queue from a captured state
    ///
    /// Every job in `state` counts as seen; only jobs marked pending become
    /// retrievable again.
    pub fn restore(state: QueueState) -> Self {
        let mut inner = QueueInner::default();

        for (job, status) in state {
            if status.is_pending() {
                inner.pending.push_back(job.clone());
            }
            inner.seen.insert(job);
        }
        inner.unfinished = inner.pending.len();

        tracing::debug!(
            "Restored queue with {} known jobs, {} pending",
            inner.seen.len(),
            inner.pending.len()
        );

        Self {
            inner: Mutex::new(inner),
            available: Notify::new(),
            idle: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues a job unless it was ever seen before
    ///
    /// The seen check and the insertion happen under one lock, so of two
    /// concurrent puts of the same job exactly one succeeds.
    ///
    /// # Returns
    ///
    /// `true` if the job was newly queued, `false` if it was a duplicate
    pub fn put(&self, job: Job) -> bool {
        {
            let mut inner = self.lock();
            if inner.seen.contains(&job) {
                tracing::trace!("Ignoring already seen job {}", job);
                return false;
            }
            inner.seen.insert(job.clone());
            inner.pending.push_back(job);
            inner.unfinished += 1;
        }

        self.available.notify_one();
        true
    }

    /// Takes the next job without waiting
    pub fn try_get(&self) -> Option<Job> {
        let mut inner = self.lock();
        let job = inner.pending.pop_front()?;
        inner.in_flight.insert(job.clone());
        Some(job)
    }

    /// Waits for the next job and returns it
    ///
    /// The job is not marked done; call `task_done` once it has been handled.
    /// Dropping the returned future before it completes loses no job.
    pub async fn get(&self) -> Job {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a put between the check and the
            // await wakes this waiter instead of being lost
            notified.as_mut().enable();

            if let Some(job) = self.try_get() {
                return job;
            }
            notified.await;
        }
    }

    /// Marks a retrieved job as fully handled
    ///
    /// Calling this for a job that is not in flight is logged and ignored.
    pub fn task_done(&self, job: &Job) {
        let now_idle = {
            let mut inner = self.lock();
            if !inner.in_flight.remove(job) {
                tracing::warn!("task_done called for {} which is not in flight", job);
                return;
            }
            inner.unfinished -= 1;
            inner.unfinished == 0
        };

        if now_idle {
            self.idle.notify_waiters();
        }
    }

    /// Waits until no job is pending and none is in flight
    pub async fn join(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a wake-up between the check and
            // the await is not missed
            notified.as_mut().enable();

            if self.is_quiescent() {
                return;
            }
            notified.await;
        }
    }

    /// Captures the full state and empties the queue of retrievable work
    ///
    /// Pending and in-flight jobs are reported as `Pending`, everything else
    /// the queue has seen as `Done`. Pending jobs are removed from the queue
    /// (they stay seen), so this is meant for the final snapshot of a run.
    /// Jobs drained this way keep being reported as `Pending` by later calls.
    pub fn snapshot(&self) -> QueueState {
        let (state, now_idle) = {
            let mut inner = self.lock();
            let drained: Vec<Job> = inner.pending.drain(..).collect();
            inner.unfinished -= drained.len();
            inner.drained.extend(drained);

            let mut state: QueueState = inner
                .seen
                .iter()
                .map(|job| (job.clone(), JobStatus::Done))
                .collect();

            for job in inner.drained.iter().chain(inner.in_flight.iter()) {
                state.insert(job.clone(), JobStatus::Pending);
            }

            (state, inner.unfinished == 0)
        };

        if now_idle {
            self.idle.notify_waiters();
        }
        state
    }

    /// Number of jobs waiting to be retrieved
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of jobs retrieved and not yet done
    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Number of distinct jobs ever accepted
    pub fn seen_len(&self) -> usize {
        self.lock().seen.len()
    }

    /// Returns whether nothing is pending and nothing is in flight
    pub fn is_quiescent(&self) -> bool {
        self.lock().unfinished == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FileJob, PageJob, RelativePath};
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    fn page(path: &str) -> Job {
        PageJob::new(Url::parse(&format!("https://example.com/{}", path)).unwrap()).into()
    }

    fn file(path: &str) -> Job {
        FileJob::new(
            Url::parse(&format!("https://example.com/img/{}", path)).unwrap(),
            RelativePath::parse(path).unwrap(),
        )
        .into()
    }

    #[test]
    fn test_put_ignores_duplicates() {
        let queue = DedupQueue::new();
        assert!(queue.put(page("ch1")));
        assert!(!queue.put(page("ch1")));
        assert!(queue.put(page("ch2")));

        assert_eq!(queue.pending_len(), 2);
        assert_eq!(queue.seen_len(), 2);
    }

    #[test]
    fn test_put_ignores_done_jobs() {
        let queue = DedupQueue::new();
        queue.put(page("ch1"));
        let job = queue.try_get().unwrap();
        queue.task_done(&job);

        assert!(!queue.put(page("ch1")));
        assert!(queue.try_get().is_none());
    }

    #[test]
    fn test_fifo_order() {
        let queue = DedupQueue::new();
        queue.put(page("ch1"));
        queue.put(file("001.jpg"));
        queue.put(page("ch2"));

        assert_eq!(queue.try_get(), Some(page("ch1")));
        assert_eq!(queue.try_get(), Some(file("001.jpg")));
        assert_eq!(queue.try_get(), Some(page("ch2")));
        assert_eq!(queue.try_get(), None);
    }

    #[test]
    fn test_task_done_for_unknown_job_is_ignored() {
        let queue = DedupQueue::new();
        queue.put(page("ch1"));

        queue.task_done(&page("ch1"));
        assert!(!queue.is_quiescent());

        let job = queue.try_get().unwrap();
        queue.task_done(&job);
        queue.task_done(&job);
        assert!(queue.is_quiescent());
    }

    #[tokio::test]
    async fn test_concurrent_puts_accept_each_job_once() {
        let queue = Arc::new(DedupQueue::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut accepted = 0;
                for i in 0..50 {
                    if queue.put(page(&format!("p{}", i % 20))) {
                        accepted += 1;
                    }
                }
                accepted
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }

        assert_eq!(total, 20);
        assert_eq!(queue.pending_len(), 20);
    }

    #[tokio::test]
    async fn test_get_waits_for_put() {
        let queue = Arc::new(DedupQueue::new());

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.put(page("ch1"));
        let job = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("get did not wake up")
            .unwrap();
        assert_eq!(job, page("ch1"));
    }

    #[tokio::test]
    async fn test_join_returns_immediately_when_empty() {
        let queue = DedupQueue::new();
        tokio::time::timeout(Duration::from_secs(1), queue.join())
            .await
            .expect("join blocked on an empty queue");
    }

    #[tokio::test]
    async fn test_join_waits_for_in_flight_job() {
        let queue = Arc::new(DedupQueue::new());
        queue.put(page("ch1"));
        let job = queue.get().await;

        // Nothing pending, but the job is still being processed
        assert_eq!(queue.pending_len(), 0);
        let early = tokio::time::timeout(Duration::from_millis(50), queue.join()).await;
        assert!(early.is_err(), "join returned while a job was in flight");

        let joiner = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.join().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Work discovered while processing keeps the queue busy
        queue.put(page("ch2"));
        queue.task_done(&job);
        assert!(!joiner.is_finished());

        let second = queue.get().await;
        queue.task_done(&second);

        tokio::time::timeout(Duration::from_secs(1), joiner)
            .await
            .expect("join did not return after the last task_done")
            .unwrap();
    }

    #[test]
    fn test_snapshot_reports_pending_and_done() {
        let queue = DedupQueue::new();
        queue.put(page("ch1"));
        queue.put(page("ch2"));
        queue.put(file("001.jpg"));

        let done = queue.try_get().unwrap();
        queue.task_done(&done);

        let state = queue.snapshot();
        assert_eq!(state.len(), 3);
        assert_eq!(state[&page("ch1")], JobStatus::Done);
        assert_eq!(state[&page("ch2")], JobStatus::Pending);
        assert_eq!(state[&file("001.jpg")], JobStatus::Pending);

        // The queue no longer hands out work, but still remembers it
        assert!(queue.try_get().is_none());
        assert!(!queue.put(page("ch2")));
        assert!(queue.is_quiescent());
    }

    #[test]
    fn test_snapshot_reports_in_flight_as_pending() {
        let queue = DedupQueue::new();
        queue.put(page("ch1"));
        let _job = queue.try_get().unwrap();

        assert_eq!(queue.in_flight_len(), 1);
        let state = queue.snapshot();
        assert_eq!(state[&page("ch1")], JobStatus::Pending);
        assert_eq!(queue.in_flight_len(), 1);
    }

    #[test]
    fn test_repeated_snapshot_keeps_drained_jobs_pending() {
        let queue = DedupQueue::new();
        queue.put(page("ch1"));
        queue.put(page("ch2"));
        let done = queue.try_get().unwrap();
        queue.task_done(&done);

        let first = queue.snapshot();
        let second = queue.snapshot();

        assert_eq!(first, second);
        assert_eq!(second[&page("ch2")], JobStatus::Pending);
        assert_eq!(second[&page("ch1")], JobStatus::Done);
        assert!(queue.is_quiescent());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_back_to_back_puts_wake_every_idle_getter() {
        for round in 0..200 {
            let queue = Arc::new(DedupQueue::new());
            let getters: Vec<_> = (0..2)
                .map(|_| {
                    let queue = queue.clone();
                    tokio::spawn(async move { queue.get().await })
                })
                .collect();

            queue.put(page(&format!("a{}", round)));
            queue.put(page(&format!("b{}", round)));

            for getter in getters {
                tokio::time::timeout(Duration::from_secs(1), getter)
                    .await
                    .expect("an idle getter missed a put")
                    .unwrap();
            }
        }
    }

    #[test]
    fn test_restore_round_trip() {
        let original = DedupQueue::new();
        original.put(page("ch1"));
        original.put(page("ch2"));
        original.put(file("001.jpg"));
        let done = original.try_get().unwrap();
        original.task_done(&done);

        let state = original.snapshot();
        let restored = DedupQueue::restore(state.clone());

        assert_eq!(restored.seen_len(), 3);
        assert_eq!(restored.pending_len(), 2);
        assert!(!restored.put(page("ch1")));
        assert!(!restored.put(file("001.jpg")));
        assert_eq!(restored.snapshot(), state);
    }

    #[test]
    fn test_restore_drops_resubmitted_pending_job() {
        let mut state = QueueState::new();
        state.insert(page("ch1"), JobStatus::Pending);

        let queue = DedupQueue::restore(state.clone());
        // Without removing the seed first it cannot be submitted again
        assert!(!queue.put(page("ch1")));
        assert_eq!(queue.pending_len(), 1);

        state.remove(&page("ch1"));
        let queue = DedupQueue::restore(state);
        assert!(queue.put(page("ch1")));
        assert_eq!(queue.pending_len(), 1);
    }
}
