use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::{DEFAULT_PROGRESS_EVERY, DEFAULT_WORKERS};
use crate::fetch::FetchOptions;

fn default_max_downloaders() -> usize {
    DEFAULT_WORKERS
}

fn default_progress_every() -> u64 {
    DEFAULT_PROGRESS_EVERY
}

/// Global configuration loaded from `~/.config/bulkfetch/config.toml`.
/// Command-line flags override these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkfetchConfig {
    /// Number of concurrent download workers.
    #[serde(default = "default_max_downloaders")]
    pub max_downloaders: usize,
    /// Task queue capacity; if missing, equals `max_downloaders`.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    /// Accepted manifest records between progress log lines (0 = off).
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
    /// Optional User-Agent header sent with every request.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Optional TCP connect timeout in seconds (None = libcurl default).
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

impl Default for BulkfetchConfig {
    fn default() -> Self {
        Self {
            max_downloaders: DEFAULT_WORKERS,
            queue_capacity: None,
            progress_every: DEFAULT_PROGRESS_EVERY,
            user_agent: None,
            connect_timeout_secs: None,
        }
    }
}

impl BulkfetchConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            user_agent: self.user_agent.clone(),
            connect_timeout: self.connect_timeout_secs.map(Duration::from_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bulkfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BulkfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = BulkfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit path. The file must exist.
pub fn load_from(path: &Path) -> Result<BulkfetchConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: BulkfetchConfig = toml::from_str(&data)
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
