//! Worker pool draining the shared queue
//!
//! Each worker loops: wait for a job, hand it to the engine, repeat. The loop
//! only looks at the cancellation token between jobs, so a worker that is
//! fetching or writing finishes that job before it stops.

use crate::crawler::coordinator::Engine;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A fixed number of workers sharing one engine
pub struct WorkerPool {
    token: CancellationToken,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Starts `concurrency` workers (at least one)
    pub fn spawn(engine: &Engine, concurrency: usize) -> Self {
        let token = CancellationToken::new();
        let mut workers = JoinSet::new();

        for id in 0..concurrency.max(1) {
            workers.spawn(worker_loop(id, engine.clone(), token.child_token()));
        }

        tracing::debug!("Started {} workers", workers.len());
        Self { token, workers }
    }

    /// Cancels all workers and waits for them to stop
    pub async fn shutdown(mut self) {
        self.token.cancel();

        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker terminated abnormally: {}", e);
            }
        }

        tracing::debug!("All workers stopped");
    }
}

async fn worker_loop(id: usize, engine: Engine, token: CancellationToken) {
    loop {
        let job = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            job = engine.queue().get() => job,
        };

        tracing::trace!("Worker {} picked {}", id, job);
        engine.handle(job).await;
    }

    tracing::trace!("Worker {} stopped", id);
}
