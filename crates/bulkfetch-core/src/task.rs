//! Download task model and output layout.
//!
//! A task's destination is `<output-root>/<shard>/<identifier>`, where the shard
//! is the first [`SHARD_LEN`] characters of the identifier. Sharding keeps any
//! single directory from accumulating millions of entries.

use std::path::{Path, PathBuf};

/// Number of leading identifier characters used as the shard directory name.
pub const SHARD_LEN: usize = 2;

/// Why an identifier cannot be turned into a destination path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier {0:?} is shorter than 2 characters")]
    TooShort(String),
    #[error("identifier {0:?} is not usable as a file name")]
    Unsafe(String),
}

/// One unit of work: fetch `url` and store it under `<shard>/<identifier>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    identifier: String,
    shard: String,
    url: String,
}

impl DownloadTask {
    /// Builds a task, deriving the shard from the identifier.
    pub fn new(identifier: impl Into<String>, url: impl Into<String>) -> Result<Self, IdentifierError> {
        let identifier = identifier.into();
        let shard = shard_of(&identifier)?.to_string();
        Ok(Self {
            identifier,
            shard,
            url: url.into(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn shard(&self) -> &str {
        &self.shard
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Shard directory under `output_root`.
    pub fn shard_dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.shard)
    }

    /// Final file path under `output_root`.
    pub fn destination(&self, output_root: &Path) -> PathBuf {
        self.shard_dir(output_root).join(&self.identifier)
    }
}

/// Returns the shard prefix of `identifier`.
///
/// Counts characters, not bytes, so multi-byte identifiers never split inside a
/// code point. Rejects identifiers that would escape their shard directory.
pub fn shard_of(identifier: &str) -> Result<&str, IdentifierError> {
    if identifier.chars().count() < SHARD_LEN {
        return Err(IdentifierError::TooShort(identifier.to_string()));
    }
    if identifier.starts_with("..") || identifier.contains(['/', '\\', '\0']) {
        return Err(IdentifierError::Unsafe(identifier.to_string()));
    }
    let end = identifier
        .char_indices()
        .nth(SHARD_LEN)
        .map(|(i, _)| i)
        .unwrap_or(identifier.len());
    Ok(&identifier[..end])
}
