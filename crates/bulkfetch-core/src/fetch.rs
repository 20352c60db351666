//! Whole-body HTTP fetch.
//!
//! Uses the curl crate (libcurl) with a fresh Easy handle per call; the handle
//! and its connection are dropped when the call returns, on success and error
//! alike. Runs in the current thread; use [`fetch_blocking`] from async code.

use std::sync::Arc;
use std::time::Duration;

/// Error from a single fetch. Transport failures and non-2xx statuses are both
/// fetch errors; neither is retried.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Curl(#[from] curl::Error),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("fetch task join: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Blocking fetch of a URL's full body into memory.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Transport knobs. Unset values leave libcurl defaults in place.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub user_agent: Option<String>,
    pub connect_timeout: Option<Duration>,
}

/// libcurl-backed fetcher.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    options: FetchOptions,
}

impl CurlFetcher {
    pub fn new(options: FetchOptions) -> Self {
        Self { options }
    }
}

impl Fetch for CurlFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        if let Some(agent) = &self.options.user_agent {
            easy.useragent(agent)?;
        }
        if let Some(timeout) = self.options.connect_timeout {
            easy.connect_timeout(timeout)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        Ok(body)
    }
}

/// Runs `fetcher` on the tokio blocking pool so a slow transfer does not stall
/// the async workers. A panicking fetcher surfaces as [`FetchError::Join`].
pub async fn fetch_blocking(fetcher: Arc<dyn Fetch>, url: String) -> Result<Vec<u8>, FetchError> {
    tokio::task::spawn_blocking(move || fetcher.fetch(&url)).await?
}
