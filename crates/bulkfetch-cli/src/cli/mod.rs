//! CLI for bulkfetch.

mod commands;

use anyhow::Result;
use bulkfetch_core::config::{self, BulkfetchConfig};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};

use commands::{run_batch_command, run_show_config, RunArgs};

/// Top-level CLI for bulkfetch.
#[derive(Debug, Parser)]
#[command(name = "bulkfetch")]
#[command(about = "bulkfetch: download every URL of a CSV manifest into a sharded tree", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/bulkfetch/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every record of a manifest into the output directory.
    Run {
        /// CSV manifest of `identifier,url` records.
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Output root; files land in <output>/<first 2 chars of id>/<id>.
        #[arg(long, value_name = "DIR")]
        output: PathBuf,

        /// Treat the first manifest record as a header and skip it.
        #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
        skip_header: bool,

        /// Number of concurrent downloads (default from config: 100).
        #[arg(long, value_name = "N")]
        max_downloaders: Option<usize>,

        /// Skip records whose identifier starts with this prefix.
        #[arg(long, value_name = "PREFIX")]
        exclude_prefix: Option<String>,

        /// Task queue capacity (default: number of downloaders).
        #[arg(long, value_name = "N")]
        queue_capacity: Option<usize>,
    },

    /// Show the config file location and effective values.
    Config,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let cfg = load_config(self.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match self.command {
            CliCommand::Run {
                input,
                output,
                skip_header,
                max_downloaders,
                exclude_prefix,
                queue_capacity,
            } => {
                let args = RunArgs {
                    input,
                    output,
                    skip_header,
                    max_downloaders,
                    exclude_prefix,
                    queue_capacity,
                };
                run_batch_command(&args, &cfg).await?;
            }
            CliCommand::Config => run_show_config(self.config.as_deref(), &cfg)?,
        }

        Ok(())
    }
}

fn load_config(explicit: Option<&Path>) -> Result<BulkfetchConfig> {
    match explicit {
        Some(path) => config::load_from(path),
        None => config::load_or_init(),
    }
}

#[cfg(test)]
mod tests;
