//! Batch driver: manifest → task queue → worker pool → summary.
//!
//! Completion is detected by draining exactly one report per enqueued task,
//! so the driver returns as soon as the last task finishes.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::fetch::Fetch;
use crate::manifest::{Manifest, ManifestError, ManifestOptions};
use crate::outcome::BatchSummary;
use crate::pool::{BatchContext, WorkerPool};
use crate::storage;
use crate::task::DownloadTask;

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 100;
/// Default number of accepted records between progress lines.
pub const DEFAULT_PROGRESS_EVERY: u64 = 1000;

/// Knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub manifest: ManifestOptions,
    pub workers: usize,
    /// Task queue capacity; `None` uses the worker count.
    pub queue_capacity: Option<usize>,
    /// Log a progress line every this many accepted records (0 disables).
    pub progress_every: u64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            manifest: ManifestOptions::default(),
            workers: DEFAULT_WORKERS,
            queue_capacity: None,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl BatchOptions {
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.workers).max(1)
    }
}

/// Downloads every task of the manifest at `manifest_path` into `output_root`.
///
/// Fatal errors (unreadable manifest, malformed record, missing output root)
/// are returned immediately; per-task failures only show up in the summary.
pub async fn run_batch(
    manifest_path: &Path,
    output_root: &Path,
    fetcher: Arc<dyn Fetch>,
    options: &BatchOptions,
) -> Result<BatchSummary> {
    let meta = tokio::fs::metadata(output_root)
        .await
        .with_context(|| format!("output directory {}", output_root.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("output path {} is not a directory", output_root.display());
    }
    let swept = storage::sweep_staging(output_root).await?;
    if swept > 0 {
        tracing::info!("removed {} staging file(s) left by an earlier run", swept);
    }
    let manifest = Manifest::open(manifest_path, options.manifest.clone())?;
    tracing::info!(
        manifest = %manifest_path.display(),
        output = %output_root.display(),
        workers = options.workers,
        "starting batch"
    );

    let ctx = Arc::new(BatchContext::new(output_root, fetcher));
    run_tasks(manifest, ctx, options).await
}

/// Feeds `tasks` through a fresh worker pool and waits for all of them.
/// Stops at the first task-source error and returns it.
pub async fn run_tasks<I>(
    tasks: I,
    ctx: Arc<BatchContext>,
    options: &BatchOptions,
) -> Result<BatchSummary>
where
    I: IntoIterator<Item = Result<DownloadTask, ManifestError>>,
{
    let mut pool = WorkerPool::start(
        Arc::clone(&ctx),
        options.workers,
        options.effective_queue_capacity(),
    );
    let mut summary = BatchSummary::default();

    for task in tasks {
        let task = task?;
        pool.submit(task).await?;
        while let Some(completion) = pool.try_next_completion() {
            summary.record(completion.outcome);
        }
        let accepted = pool.enqueued();
        if options.progress_every > 0 && accepted % options.progress_every == 0 {
            tracing::info!("queued {} task(s), {} completed", accepted, ctx.completed());
        }
    }

    let enqueued = pool.enqueued();
    tracing::debug!(enqueued, "manifest exhausted, waiting for workers");
    while let Some(completion) = pool.next_completion().await? {
        summary.record(completion.outcome);
    }
    pool.shutdown().await?;

    debug_assert_eq!(summary.total(), enqueued);
    tracing::info!("batch complete: {}", summary);
    Ok(summary)
}
