//! Compression pipeline - coordinates one product's compression run
//!
//! Per message:
//! 1. Load the product's source images from the store
//! 2. Fan out fetch, compress and upload per image (capped by a semaphore)
//! 3. Fan in successes and stage-tagged failures
//! 4. Persist compressed image rows according to the commit policy
//! 5. Invalidate the product's cache entry

use super::fetcher::ImageFetcher;
use super::processor::JpegCompressor;
use super::storage::{compressed_key, BlobStore};
use super::{CommitPolicy, WorkerState};
use crate::cache::{product_key, ProductCache};
use crate::config::Config;
use crate::db::ProductStore;
use crate::kafka::decode_product_id;
use crate::metrics;
use crate::models::{CompressedImage, CompressedUpload, Image};
use resilience::with_timeout_result;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Step of the per-image work that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    Fetch,
    Compress,
    Upload,
    Task,
}

impl ImageStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStage::Fetch => "fetch",
            ImageStage::Compress => "compress",
            ImageStage::Upload => "upload",
            ImageStage::Task => "task",
        }
    }
}

impl fmt::Display for ImageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one image's fetch, compress or upload
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompressionError {
    #[error("failed to fetch image {image_id}: {message}")]
    Fetch { image_id: i64, message: String },

    #[error("failed to compress image {image_id}: {message}")]
    Compress { image_id: i64, message: String },

    #[error("failed to upload image {image_id}: {message}")]
    Upload { image_id: i64, message: String },

    /// The image task panicked or was cancelled
    #[error("image task aborted: {message}")]
    Task { message: String },
}

impl CompressionError {
    pub fn stage(&self) -> ImageStage {
        match self {
            CompressionError::Fetch { .. } => ImageStage::Fetch,
            CompressionError::Compress { .. } => ImageStage::Compress,
            CompressionError::Upload { .. } => ImageStage::Upload,
            CompressionError::Task { .. } => ImageStage::Task,
        }
    }

    pub fn image_id(&self) -> Option<i64> {
        match self {
            CompressionError::Fetch { image_id, .. }
            | CompressionError::Compress { image_id, .. }
            | CompressionError::Upload { image_id, .. } => Some(*image_id),
            CompressionError::Task { .. } => None,
        }
    }
}

/// Outcome of processing one queue message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressionReport {
    pub product_id: i64,
    /// Source images loaded for the product
    pub attempted: usize,
    /// Rows committed by this run
    pub persisted: Vec<CompressedImage>,
    /// Per-image failures in completion order
    pub failures: Vec<CompressionError>,
    /// Store failure that ended the run early (image load or persistence)
    pub aborted: Option<String>,
    pub invalidated: bool,
}

impl CompressionReport {
    fn new(product_id: i64) -> Self {
        Self {
            product_id,
            ..Default::default()
        }
    }

    /// Aggregate error of the fan-in: the first failure to complete
    pub fn first_error(&self) -> Option<&CompressionError> {
        self.failures.first()
    }

    pub fn outcome(&self) -> &'static str {
        if self.aborted.is_some() {
            "aborted"
        } else if self.failures.is_empty() {
            "ok"
        } else {
            "partial"
        }
    }
}

/// Tunables of the pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Cap on concurrent image tasks per message; 0 disables the cap
    pub max_concurrency: usize,
    pub commit_policy: CommitPolicy,
    pub cache_timeout: Duration,
    pub jpeg_quality: u8,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            commit_policy: CommitPolicy::BestEffort,
            cache_timeout: Duration::from_secs(1),
            jpeg_quality: super::processor::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrency: config.worker.max_concurrency,
            commit_policy: config.worker.commit_policy,
            cache_timeout: config.cache.timeout(),
            jpeg_quality: config.worker.jpeg_quality,
        }
    }
}

/// Compression pipeline for one product at a time
pub struct CompressionPipeline {
    store: Arc<dyn ProductStore>,
    cache: Arc<dyn ProductCache>,
    fetcher: Arc<dyn ImageFetcher>,
    blobs: Arc<dyn BlobStore>,
    compressor: Arc<JpegCompressor>,
    options: PipelineOptions,
    state_tx: watch::Sender<WorkerState>,
}

impl CompressionPipeline {
    pub fn new(
        store: Arc<dyn ProductStore>,
        cache: Arc<dyn ProductCache>,
        fetcher: Arc<dyn ImageFetcher>,
        blobs: Arc<dyn BlobStore>,
        options: PipelineOptions,
    ) -> Self {
        let (state_tx, _) = watch::channel(WorkerState::Idle);
        let compressor = Arc::new(JpegCompressor::new(options.jpeg_quality));

        Self {
            store,
            cache,
            fetcher,
            blobs,
            compressor,
            options,
            state_tx,
        }
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> WorkerState {
        *self.state_tx.borrow()
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state_tx.send_replace(state);
    }

    /// Decode a queue payload and process it
    ///
    /// Returns `None` when the payload is not a product id.
    pub async fn handle_message(&self, payload: &[u8]) -> Option<CompressionReport> {
        match decode_product_id(payload) {
            Some(product_id) => Some(self.process(product_id).await),
            None => {
                warn!(
                    payload = %String::from_utf8_lossy(payload),
                    "Message payload is not a product id, skipping"
                );
                metrics::record_message("skipped");
                None
            }
        }
    }

    /// Run the full pipeline for one product
    pub async fn process(&self, product_id: i64) -> CompressionReport {
        let started = Instant::now();
        let mut report = CompressionReport::new(product_id);

        self.run(product_id, &mut report).await;

        metrics::record_message(report.outcome());
        metrics::observe_pipeline(started.elapsed());
        self.set_state(WorkerState::Idle);

        report
    }

    async fn run(&self, product_id: i64, report: &mut CompressionReport) {
        self.set_state(WorkerState::Fetching);

        let images = match self.store.get_product_images(product_id).await {
            Ok(images) => images,
            Err(e) => {
                error!(product_id, error = %e, "Failed to load product images");
                report.aborted = Some(e.to_string());
                return;
            }
        };
        report.attempted = images.len();

        self.set_state(WorkerState::Compressing);
        let (uploads, failures) = self.fan_out(product_id, images).await;

        self.set_state(WorkerState::Aggregating);
        report.failures = failures;
        if let Some(first) = report.first_error() {
            warn!(
                product_id,
                failed = report.failures.len(),
                succeeded = uploads.len(),
                error = %first,
                "Some images failed to compress"
            );
        }

        if self.should_persist(&uploads, &report.failures) {
            self.set_state(WorkerState::Persisting);
            match self
                .store
                .insert_compressed_images(product_id, &uploads)
                .await
            {
                Ok(rows) => report.persisted = rows,
                Err(e) => {
                    error!(product_id, error = %e, "Failed to persist compressed images");
                    report.aborted = Some(e.to_string());
                    return;
                }
            }
        } else if !uploads.is_empty() {
            info!(
                product_id,
                uploaded = uploads.len(),
                policy = %self.options.commit_policy,
                "Skipping persistence after partial failure"
            );
        }

        self.set_state(WorkerState::Invalidating);
        report.invalidated = self.invalidate(product_id).await;
    }

    fn should_persist(&self, uploads: &[CompressedUpload], failures: &[CompressionError]) -> bool {
        if uploads.is_empty() {
            return false;
        }
        match self.options.commit_policy {
            CommitPolicy::BestEffort => true,
            CommitPolicy::AllOrNothing => failures.is_empty(),
        }
    }

    /// Fetch, compress and upload every image concurrently
    ///
    /// A failing image never cancels its siblings. Dropping the returned
    /// future aborts every task still in the set.
    async fn fan_out(
        &self,
        product_id: i64,
        images: Vec<Image>,
    ) -> (Vec<CompressedUpload>, Vec<CompressionError>) {
        let limiter = (self.options.max_concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.options.max_concurrency)));

        let mut tasks = JoinSet::new();
        for image in images {
            let limiter = limiter.clone();
            let fetcher = self.fetcher.clone();
            let blobs = self.blobs.clone();
            let compressor = self.compressor.clone();

            tasks.spawn(async move {
                // The semaphore is never closed; a closed one would just lift the cap
                let _permit = match limiter {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                compress_one(image, fetcher.as_ref(), blobs.as_ref(), compressor).await
            });
        }

        let mut uploads = Vec::new();
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(CompressionError::Task {
                    message: e.to_string(),
                })
            });

            match result {
                Ok(upload) => {
                    metrics::record_image("ok");
                    debug!(product_id, image_id = upload.image_id, url = %upload.url, "Image compressed");
                    uploads.push(upload);
                }
                Err(e) => {
                    metrics::record_image(e.stage().as_str());
                    warn!(product_id, stage = %e.stage(), error = %e, "Image compression failed");
                    failures.push(e);
                }
            }
        }

        (uploads, failures)
    }

    /// Delete the product's cache entry; failures are logged, never retried
    async fn invalidate(&self, product_id: i64) -> bool {
        let key = product_key(product_id);
        let result = with_timeout_result(
            "cache.delete",
            self.options.cache_timeout,
            self.cache.delete(&key),
        )
        .await;

        match result {
            Ok(existed) => {
                debug!(product_id, existed, "Cache entry invalidated");
                metrics::record_invalidation(true);
                true
            }
            Err(e) => {
                warn!(product_id, error = %e, "Failed to invalidate product cache entry");
                metrics::record_invalidation(false);
                false
            }
        }
    }
}

async fn compress_one(
    image: Image,
    fetcher: &dyn ImageFetcher,
    blobs: &dyn BlobStore,
    compressor: Arc<JpegCompressor>,
) -> Result<CompressedUpload, CompressionError> {
    let image_id = image.id;

    let original = fetcher
        .fetch(&image.url)
        .await
        .map_err(|e| CompressionError::Fetch {
            image_id,
            message: e.to_string(),
        })?;

    let jpeg = compressor
        .compress_async(original)
        .await
        .map_err(|e| CompressionError::Compress {
            image_id,
            message: e.to_string(),
        })?;

    let key = compressed_key(image_id, &image.url);
    let url = blobs
        .put(&key, jpeg, JPEG_CONTENT_TYPE)
        .await
        .map_err(|e| CompressionError::Upload {
            image_id,
            message: e.to_string(),
        })?;

    Ok(CompressedUpload { url, image_id })
}
