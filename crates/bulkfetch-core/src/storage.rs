//! Disk side of a task: shard directories and final files.
//!
//! Payloads are staged in a uniquely named temp file directly under the
//! output root and renamed into place, so a file at the destination path is
//! always complete. That existence check is the only signal the batch uses to
//! skip work on a re-run.
//!
//! Staging files never live in a shard directory. The output root only holds
//! two-character shard directories, so a staging name can never be mistaken
//! for, or overwrite, an identifier's file.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name prefix of staging files in the output root.
pub const STAGING_PREFIX: &str = ".bulkfetch-";
/// Name suffix of staging files in the output root.
pub const STAGING_SUFFIX: &str = ".part";

/// Permissions of persisted files (read-only for everyone).
#[cfg(unix)]
pub const FILE_MODE: u32 = 0o444;

/// Creates `dir` if it is missing. Only the last component is created; the
/// parent must exist. Another worker creating it first is not an error.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    match tokio::fs::create_dir(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("failed to create directory {}", dir.display()))
        }
    }
}

/// Writes `data` to `dest` through a staging file in `staging_dir`, which
/// must be on the same filesystem. Fails if the parent of `dest` does not
/// exist. An existing file at `dest` is replaced.
pub async fn persist(staging_dir: &Path, dest: &Path, data: Vec<u8>) -> Result<()> {
    let staging_dir = staging_dir.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || persist_blocking(&staging_dir, &dest, &data))
        .await
        .context("persist task panicked")?
}

fn persist_blocking(staging_dir: &Path, dest: &Path, data: &[u8]) -> Result<()> {
    let mut staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(staging_dir)
        .with_context(|| format!("failed to create staging file in {}", staging_dir.display()))?;
    let staged_path = staged.path().to_path_buf();
    staged
        .write_all(data)
        .and_then(|()| staged.flush())
        .with_context(|| format!("failed to write {}", staged_path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&staged_path, std::fs::Permissions::from_mode(FILE_MODE))
            .with_context(|| format!("failed to set mode on {}", staged_path.display()))?;
    }
    // On failure the returned temp file is dropped, which removes it.
    staged
        .persist(dest)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to move payload into {}", dest.display()))?;
    Ok(())
}

/// True for names produced by [`persist`] for its staging files.
pub fn is_staging_name(name: &str) -> bool {
    name.len() > STAGING_PREFIX.len() + STAGING_SUFFIX.len()
        && name.starts_with(STAGING_PREFIX)
        && name.ends_with(STAGING_SUFFIX)
}

/// Removes staging files an interrupted run left in `root`. Returns how many
/// were removed.
pub async fn sweep_staging(root: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(root)
        .await
        .with_context(|| format!("failed to list {}", root.display()))?;
    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to list {}", root.display()))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_staging_name(name) || !entry.file_type().await?.is_file() {
            continue;
        }
        let path: PathBuf = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("failed to remove {}", path.display()))
            }
        }
    }
    Ok(removed)
}
