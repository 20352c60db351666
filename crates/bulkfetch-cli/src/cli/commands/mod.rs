//! CLI command handlers. Each command is in its own file.

mod config;
mod run;

pub use config::run_show_config;
pub use run::{run_batch_command, RunArgs};
