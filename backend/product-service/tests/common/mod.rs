//! In-memory collaborators for integration tests
//!
//! Each fake implements one of the service seams without touching Postgres,
//! Redis, Kafka or S3, and records enough about its calls for assertions.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
use product_service::cache::ProductCache;
use product_service::db::ProductStore;
use product_service::error::{AppError, Result};
use product_service::kafka::ProductEventPublisher;
use product_service::models::{
    CompressedImage, CompressedUpload, Image, NewProduct, Product, ProductFilter,
};
use product_service::services::compression::{
    BlobStore, CompressionPipeline, ImageFetcher, PipelineOptions,
};
use product_service::services::ProductService;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BUCKET_URL: &str = "https://product-images.s3.amazonaws.com";

/// Small PNG used as a fetchable source image
pub fn png_bytes() -> Bytes {
    let img = ImageBuffer::from_fn(16, 12, |x, y| Rgb([(x * 16) as u8, (y * 20) as u8, 90]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .expect("encode png fixture");
    Bytes::from(buf)
}

// ========================================
// Store
// ========================================

#[derive(Default)]
struct StoreState {
    users: HashSet<i64>,
    products: BTreeMap<i64, Product>,
    next_product_id: i64,
    next_image_id: i64,
    next_compressed_id: i64,
}

/// Product store backed by a map
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    pub fail_user_lookup: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_insert_compressed: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
    pub get_product_calls: AtomicUsize,
    pub insert_compressed_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            state.next_product_id = 1;
            state.next_image_id = 1;
            state.next_compressed_id = 1;
        }
        store
    }

    pub fn with_user(self, user_id: i64) -> Self {
        self.state.lock().unwrap().users.insert(user_id);
        self
    }

    /// Insert a product with a fixed id and source image URLs
    pub fn seed_product(&self, product_id: i64, user_id: i64, name: &str, price: f64, urls: &[&str]) -> Product {
        let mut state = self.state.lock().unwrap();
        state.users.insert(user_id);

        let images = urls
            .iter()
            .map(|url| {
                let id = state.next_image_id;
                state.next_image_id += 1;
                Image {
                    id,
                    url: url.to_string(),
                }
            })
            .collect();

        let product = Product {
            product_id,
            product_name: name.to_string(),
            product_description: format!("{name} description"),
            product_price: price,
            user_id,
            images,
            compressed_images: Vec::new(),
        };
        state.products.insert(product_id, product.clone());
        state.next_product_id = state.next_product_id.max(product_id + 1);
        product
    }

    pub fn product(&self, product_id: i64) -> Option<Product> {
        self.state.lock().unwrap().products.get(&product_id).cloned()
    }

    pub fn compressed_rows(&self, product_id: i64) -> Vec<CompressedImage> {
        self.product(product_id)
            .map(|p| p.compressed_images)
            .unwrap_or_default()
    }

    pub fn product_count(&self) -> usize {
        self.state.lock().unwrap().products.len()
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    fn read_delay(&self) -> Option<Duration> {
        *self.read_delay.lock().unwrap()
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(AppError::DatabaseError(format!("{what} failed")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn user_exists(&self, user_id: i64) -> Result<bool> {
        Self::check(&self.fail_user_lookup, "user lookup")?;
        Ok(self.state.lock().unwrap().users.contains(&user_id))
    }

    async fn create_product(&self, new: &NewProduct) -> Result<Product> {
        Self::check(&self.fail_create, "insert product")?;

        let mut state = self.state.lock().unwrap();
        let product_id = state.next_product_id;
        state.next_product_id += 1;

        let mut images = Vec::with_capacity(new.image_urls.len());
        for url in &new.image_urls {
            let id = state.next_image_id;
            state.next_image_id += 1;
            images.push(Image {
                id,
                url: url.clone(),
            });
        }

        let product = Product {
            product_id,
            product_name: new.name.clone(),
            product_description: new.description.clone(),
            product_price: new.price,
            user_id: new.user_id,
            images,
            compressed_images: Vec::new(),
        };
        state.products.insert(product_id, product.clone());
        Ok(product)
    }

    /// The snapshot is taken before the configured read delay, like a query
    /// whose result is still in flight back to the caller
    async fn get_product(&self, product_id: i64) -> Result<Option<Product>> {
        self.get_product_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_reads, "select product")?;
        let snapshot = self.product(product_id);
        if let Some(delay) = self.read_delay() {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        Self::check(&self.fail_reads, "select products")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .values()
            .filter(|p| filter_matches(filter, p))
            .cloned()
            .collect())
    }

    async fn get_product_images(&self, product_id: i64) -> Result<Vec<Image>> {
        Self::check(&self.fail_reads, "select images")?;
        Ok(self
            .product(product_id)
            .map(|p| p.images)
            .unwrap_or_default())
    }

    async fn insert_compressed_images(
        &self,
        product_id: i64,
        uploads: &[CompressedUpload],
    ) -> Result<Vec<CompressedImage>> {
        self.insert_compressed_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_insert_compressed, "insert compressed images")?;

        let mut state = self.state.lock().unwrap();
        let mut inserted = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let id = state.next_compressed_id;
            state.next_compressed_id += 1;
            inserted.push(CompressedImage {
                id,
                url: upload.url.clone(),
                image_id: upload.image_id,
            });
        }

        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| AppError::DatabaseError("foreign key violation".to_string()))?;
        product.compressed_images.extend(inserted.iter().cloned());
        Ok(inserted)
    }
}

/// In-memory stand-in for the listing query; name match is case-insensitive
fn filter_matches(filter: &ProductFilter, product: &Product) -> bool {
    product.user_id == filter.user_id
        && filter.min_price.map_or(true, |min| product.product_price >= min)
        && filter.max_price.map_or(true, |max| product.product_price <= max)
        && filter.name_contains.as_ref().map_or(true, |needle| {
            product
                .product_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        })
}

// ========================================
// Cache
// ========================================

/// Cache backed by a map, with failure and latency switches
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, String>>,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
    pub fail_delete: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pub sets: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn entry(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    async fn wait(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProductCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.wait().await;
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(AppError::CacheError("connection refused".to_string()));
        }
        Ok(self.entry(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.wait().await;
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(AppError::CacheError("connection refused".to_string()));
        }
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.wait().await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::CacheError("connection refused".to_string()));
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }
}

// ========================================
// Queue
// ========================================

/// Publisher that records every product id it was asked to send
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<i64>>,
    pub fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay before each delivery report
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn published(&self) -> Vec<i64> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductEventPublisher for RecordingPublisher {
    async fn publish_product_created(&self, product_id: i64) -> Result<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::QueueError("broker unavailable".to_string()));
        }
        self.published.lock().unwrap().push(product_id);
        Ok(())
    }
}

// ========================================
// Fetcher
// ========================================

/// Serves registered URLs; anything else is a 404
#[derive(Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, Bytes>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: Bytes) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), body);
    }

    pub fn serve_png(&self, url: &str) {
        self.serve(url, png_bytes());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let body = self.responses.lock().unwrap().get(url).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        body.ok_or_else(|| AppError::Internal(format!("Failed to fetch {url}: HTTP 404 Not Found")))
    }
}

// ========================================
// Blob store
// ========================================

/// Blob store keeping uploads in memory
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<BTreeMap<String, (Bytes, String)>>,
    failing_keys: Mutex<Vec<String>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads whose key contains `fragment` fail
    pub fn fail_keys_containing(&self, fragment: &str) {
        self.failing_keys.lock().unwrap().push(fragment.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String> {
        let failing = self
            .failing_keys
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| key.contains(fragment.as_str()));
        if failing {
            return Err(AppError::StorageError(format!("put {key}: access denied")));
        }

        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(format!("{BUCKET_URL}/{key}"))
    }
}

// ========================================
// Wiring
// ========================================

/// All fakes behind one handle
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<InMemoryCache>,
    pub publisher: Arc<RecordingPublisher>,
    pub fetcher: Arc<FakeFetcher>,
    pub blobs: Arc<InMemoryBlobStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new().with_user(1)),
            cache: Arc::new(InMemoryCache::new()),
            publisher: Arc::new(RecordingPublisher::new()),
            fetcher: Arc::new(FakeFetcher::new()),
            blobs: Arc::new(InMemoryBlobStore::new()),
        }
    }

    pub fn product_service(&self) -> ProductService {
        self.product_service_with_timeout(Duration::from_millis(200))
    }

    pub fn product_service_with_timeout(&self, cache_timeout: Duration) -> ProductService {
        ProductService::new(
            self.store.clone(),
            self.cache.clone(),
            self.publisher.clone(),
            cache_timeout,
        )
    }

    pub fn pipeline(&self, options: PipelineOptions) -> CompressionPipeline {
        CompressionPipeline::new(
            self.store.clone(),
            self.cache.clone(),
            self.fetcher.clone(),
            self.blobs.clone(),
            options,
        )
    }

    pub fn default_pipeline(&self) -> CompressionPipeline {
        self.pipeline(PipelineOptions {
            cache_timeout: Duration::from_millis(200),
            ..PipelineOptions::default()
        })
    }
}
