//! Blob storage for compressed images
//!
//! Objects are written under `compressed_images/{image_id}_{filename}` and
//! addressed by their public URL.

use crate::config::S3Config;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use resilience::with_timeout_result;
use std::time::Duration;
use tracing::debug;

/// Prefix of every compressed object key
pub const COMPRESSED_PREFIX: &str = "compressed_images";

/// Used when the source URL has no usable last path segment
const FALLBACK_FILENAME: &str = "image";

/// Object store receiving compressed images
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `body` under `key` and return its public URL
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String>;
}

/// Last path segment of a source URL, query and fragment excluded
pub fn original_filename(source_url: &str) -> String {
    let segment = match url::Url::parse(source_url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        // Relative or malformed URL: strip query/fragment by hand
        Err(_) => source_url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').find(|s| !s.is_empty()))
            .map(str::to_string),
    };

    segment.unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Object key for the compressed copy of an image
pub fn compressed_key(image_id: i64, source_url: &str) -> String {
    format!(
        "{}/{}_{}",
        COMPRESSED_PREFIX,
        image_id,
        original_filename(source_url)
    )
}

/// Build an S3 client; explicit credentials and endpoint override the
/// default provider chain
pub async fn get_s3_client(config: &S3Config) -> Client {
    use aws_sdk_s3::config::Region;

    let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        use aws_sdk_s3::config::Credentials;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "product_service_s3",
        );

        aws_config_builder = aws_config_builder.credentials_provider(credentials);
    }

    // S3-compatible storage such as MinIO
    if let Some(endpoint) = &config.endpoint {
        aws_config_builder = aws_config_builder.endpoint_url(endpoint);
    }

    let aws_config = aws_config_builder.load().await;
    Client::new(&aws_config)
}

/// S3-backed blob store
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    config: S3Config,
}

impl S3BlobStore {
    pub fn new(client: Client, config: S3Config) -> Self {
        Self { client, config }
    }

    pub async fn from_config(config: S3Config) -> Self {
        let client = get_s3_client(&config).await;
        Self::new(client, config)
    }

    fn upload_timeout(&self) -> Duration {
        self.config.upload_timeout()
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String> {
        let size = body.len();
        let request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send();

        with_timeout_result("s3.put_object", self.upload_timeout(), request)
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))?;

        debug!(key, size, bucket = %self.config.bucket, "Uploaded compressed image");
        Ok(self.config.object_url(key))
    }
}
