//! How image bytes are actually obtained.
//!
//! Prefetch is two-tier: a cheap direct load that lets the host's own cache
//! keep the bytes, then a binary fetch when the direct load fails. The
//! fallback exists for cross-origin cases where the direct path fails without
//! saying why.

use async_trait::async_trait;
use folio_core::FolioResult;

/// Source of images for the prefetcher.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Load the image through the host's normal path. Success means the host
    /// now has it cached; no bytes are handed back.
    async fn load_direct(&self, url: &str) -> FolioResult<()>;

    /// Fetch the raw bytes so they can be held locally.
    async fn fetch_bytes(&self, url: &str) -> FolioResult<Vec<u8>>;
}

/// Fetcher for hosts with nothing to warm: every direct load succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopImageFetcher;

#[async_trait]
impl ImageFetcher for NoopImageFetcher {
    async fn load_direct(&self, _url: &str) -> FolioResult<()> {
        Ok(())
    }

    async fn fetch_bytes(&self, _url: &str) -> FolioResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

#[cfg(feature = "http")]
mod http {
    use super::*;
    use folio_core::{FolioError, PreloadError};
    use reqwest::{Response, StatusCode};

    /// HTTP fetcher. Both tiers issue a `GET` and read the body: the direct
    /// load drops it once it has passed through any HTTP cache on the way,
    /// the fallback hands it back.
    #[derive(Debug, Clone, Default)]
    pub struct HttpImageFetcher {
        client: reqwest::Client,
    }

    impl HttpImageFetcher {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        async fn get_body(&self, url: &str) -> FolioResult<Vec<u8>> {
            let response: Response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| fetch_failure(url, e))?;
            check_status(url, response.status())?;
            let bytes = response.bytes().await.map_err(|e| fetch_failure(url, e))?;
            Ok(bytes.to_vec())
        }
    }

    pub(super) fn fetch_failure(url: &str, reason: impl ToString) -> FolioError {
        PreloadError::FetchFailure {
            url: url.to_string(),
            reason: reason.to_string(),
        }
        .into()
    }

    /// Anything outside 2xx is a failed fetch.
    pub(super) fn check_status(url: &str, status: StatusCode) -> FolioResult<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(fetch_failure(url, format!("unexpected status {status}")))
        }
    }

    #[async_trait]
    impl ImageFetcher for HttpImageFetcher {
        async fn load_direct(&self, url: &str) -> FolioResult<()> {
            self.get_body(url).await.map(drop)
        }

        async fn fetch_bytes(&self, url: &str) -> FolioResult<Vec<u8>> {
            self.get_body(url).await
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpImageFetcher;
