//! `bulkfetch run` – download every record of a manifest.

use anyhow::Result;
use bulkfetch_core::batch::{self, BatchOptions};
use bulkfetch_core::config::BulkfetchConfig;
use bulkfetch_core::fetch::CurlFetcher;
use bulkfetch_core::manifest::ManifestOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Arguments of the `run` subcommand; `None` falls back to the config file.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    pub skip_header: bool,
    pub max_downloaders: Option<usize>,
    pub exclude_prefix: Option<String>,
    pub queue_capacity: Option<usize>,
}

impl RunArgs {
    /// Merges flags over config values.
    pub fn batch_options(&self, cfg: &BulkfetchConfig) -> BatchOptions {
        BatchOptions {
            manifest: ManifestOptions {
                skip_header: self.skip_header,
                exclude_prefix: self.exclude_prefix.clone().filter(|p| !p.is_empty()),
            },
            workers: self.max_downloaders.unwrap_or(cfg.max_downloaders),
            queue_capacity: self.queue_capacity.or(cfg.queue_capacity),
            progress_every: cfg.progress_every,
        }
    }
}

pub async fn run_batch_command(args: &RunArgs, cfg: &BulkfetchConfig) -> Result<()> {
    let options = args.batch_options(cfg);
    let fetcher = Arc::new(CurlFetcher::new(cfg.fetch_options()));

    let started = Instant::now();
    let summary = batch::run_batch(&args.input, &args.output, fetcher, &options).await?;

    println!("{} in {:.1}s", summary, started.elapsed().as_secs_f64());
    if summary.failed() > 0 {
        tracing::warn!("{} task(s) failed; re-run to retry them", summary.failed());
    }
    Ok(())
}
