//! Source image download

use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

/// Downloads the bytes behind a source image URL
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// `reqwest`-based fetcher; any non-2xx status is an error
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Internal(format!(
                "Failed to fetch {url}: HTTP {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read body of {url}: {e}")))?;

        debug!(url, size = body.len(), "Fetched source image");
        Ok(body)
    }
}
