//! `bulkfetch config` – show where the config lives and what it says.

use anyhow::Result;
use bulkfetch_core::config::{self, BulkfetchConfig};
use std::path::Path;

pub fn run_show_config(explicit: Option<&Path>, cfg: &BulkfetchConfig) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
