//! Fixed-size worker pool fed by a bounded task queue.
//!
//! Workers share one receiver and each handles a single task at a time:
//! ensure shard dir → skip if destination exists → fetch → persist. Every
//! dequeued task produces exactly one [`Completion`] and one increment of the
//! shared completion counter, whatever its outcome.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::fetch::{fetch_blocking, Fetch};
use crate::outcome::TaskOutcome;
use crate::storage;
use crate::task::DownloadTask;

/// State shared by all workers of one batch.
pub struct BatchContext {
    output_root: PathBuf,
    fetcher: Arc<dyn Fetch>,
    completed: AtomicU64,
}

impl BatchContext {
    pub fn new(output_root: impl Into<PathBuf>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            output_root: output_root.into(),
            fetcher,
            completed: AtomicU64::new(0),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Tasks that reached a terminal outcome so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }
}

/// Report sent by a worker when it finishes a task.
#[derive(Debug, Clone)]
pub struct Completion {
    pub identifier: String,
    pub outcome: TaskOutcome,
}

type SharedQueue = Arc<Mutex<mpsc::Receiver<DownloadTask>>>;

/// Handle to a running pool. Dropping it closes the queue and aborts workers.
pub struct WorkerPool {
    queue: mpsc::Sender<DownloadTask>,
    completions: mpsc::UnboundedReceiver<Completion>,
    workers: JoinSet<()>,
    enqueued: u64,
    reported: u64,
}

impl WorkerPool {
    /// Starts `workers` workers (at least one) behind a queue holding up to
    /// `queue_capacity` tasks (at least one).
    pub fn start(ctx: Arc<BatchContext>, workers: usize, queue_capacity: usize) -> Self {
        let workers_n = workers.max(1);
        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity.max(1));
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let queue_rx: SharedQueue = Arc::new(Mutex::new(queue_rx));

        let mut join_set = JoinSet::new();
        for id in 0..workers_n {
            let ctx = Arc::clone(&ctx);
            let queue_rx = Arc::clone(&queue_rx);
            let done_tx = done_tx.clone();
            join_set.spawn(worker_loop(id, ctx, queue_rx, done_tx));
        }
        tracing::debug!(workers = workers_n, "worker pool started");

        Self {
            queue: queue_tx,
            completions: done_rx,
            workers: join_set,
            enqueued: 0,
            reported: 0,
        }
    }

    /// Enqueues a task, waiting while the queue is full.
    pub async fn submit(&mut self, task: DownloadTask) -> Result<()> {
        self.queue
            .send(task)
            .await
            .map_err(|_| anyhow::anyhow!("worker pool stopped; task queue closed"))?;
        self.enqueued += 1;
        Ok(())
    }

    /// Tasks handed to the queue so far.
    pub fn enqueued(&self) -> u64 {
        self.enqueued
    }

    /// Enqueued tasks whose completion has not been received yet.
    pub fn outstanding(&self) -> u64 {
        self.enqueued - self.reported
    }

    /// Returns a completion that is already available, without waiting.
    pub fn try_next_completion(&mut self) -> Option<Completion> {
        let completion = self.completions.try_recv().ok()?;
        self.reported += 1;
        Some(completion)
    }

    /// Waits for the next completion. Returns `None` once nothing is
    /// outstanding.
    pub async fn next_completion(&mut self) -> Result<Option<Completion>> {
        if self.outstanding() == 0 {
            return Ok(None);
        }
        let Some(completion) = self.completions.recv().await else {
            anyhow::bail!(
                "all workers exited with {} task(s) outstanding",
                self.outstanding()
            );
        };
        self.reported += 1;
        Ok(Some(completion))
    }

    /// Closes the queue and waits for workers to drain it and exit.
    pub async fn shutdown(self) -> Result<()> {
        let WorkerPool {
            queue, mut workers, ..
        } = self;
        drop(queue);
        while let Some(res) = workers.join_next().await {
            res.map_err(|e| anyhow::anyhow!("worker task join: {}", e))?;
        }
        Ok(())
    }
}

async fn worker_loop(
    id: usize,
    ctx: Arc<BatchContext>,
    queue: SharedQueue,
    done: mpsc::UnboundedSender<Completion>,
) {
    loop {
        // Hold the lock only while waiting for the next task.
        let next = { queue.lock().await.recv().await };
        let Some(task) = next else {
            break;
        };
        let outcome = process_task(&ctx, &task).await;
        ctx.completed.fetch_add(1, Ordering::AcqRel);
        let completion = Completion {
            identifier: task.identifier().to_string(),
            outcome,
        };
        if done.send(completion).is_err() {
            break;
        }
    }
    tracing::trace!(worker = id, "worker exiting");
}

/// Runs one task to its terminal outcome. Failures are logged here and never
/// returned as errors; each failed task emits exactly one `warn` line.
pub async fn process_task(ctx: &BatchContext, task: &DownloadTask) -> TaskOutcome {
    let shard_dir = task.shard_dir(&ctx.output_root);
    if let Err(e) = storage::ensure_dir(&shard_dir).await {
        tracing::warn!("write failed for {}: {:#}", task.identifier(), e);
        return TaskOutcome::WriteFailed;
    }

    let dest = task.destination(&ctx.output_root);
    match tokio::fs::try_exists(&dest).await {
        Ok(true) => {
            tracing::debug!(id = task.identifier(), "already present, skipping");
            return TaskOutcome::Skipped;
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!("cannot stat {}: {}", dest.display(), e);
            return TaskOutcome::WriteFailed;
        }
    }

    let body = match fetch_blocking(Arc::clone(&ctx.fetcher), task.url().to_string()).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("fetch failed for {}: {}", task.url(), e);
            return TaskOutcome::FetchFailed;
        }
    };

    let bytes = body.len() as u64;
    match storage::persist(&ctx.output_root, &dest, body).await {
        Ok(()) => {
            tracing::debug!(id = task.identifier(), bytes, "written");
            TaskOutcome::Written { bytes }
        }
        Err(e) => {
            tracing::warn!("write failed for {}: {:#}", task.identifier(), e);
            TaskOutcome::WriteFailed
        }
    }
}
