/// Product service: creation with publish-after-commit, listing, and the
/// cache-aside read path
use std::sync::Arc;
use std::time::Duration;

use resilience::{with_timeout, with_timeout_result};
use tracing::{debug, error, info, warn};

use crate::cache::{product_key, ProductCache};
use crate::db::ProductStore;
use crate::error::{AppError, Result};
use crate::kafka::ProductEventPublisher;
use crate::metrics;
use crate::models::{CreateProductRequest, ListProductsQuery, Product, ProductFilter};

const CREATE_FAILED: &str = "Failed to create product";

/// Product service for handling API operations
pub struct ProductService {
    store: Arc<dyn ProductStore>,
    cache: Arc<dyn ProductCache>,
    publisher: Arc<dyn ProductEventPublisher>,
    cache_timeout: Duration,
}

impl ProductService {
    pub fn new(
        store: Arc<dyn ProductStore>,
        cache: Arc<dyn ProductCache>,
        publisher: Arc<dyn ProductEventPublisher>,
        cache_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            cache_timeout,
        }
    }

    /// Validate, persist, then publish a compression request
    ///
    /// The publish happens strictly after commit. If it fails the product
    /// stays committed and the caller gets a 500. The publish is awaited to
    /// its delivery report with no outer deadline, so a 500 never hides a
    /// record that was written anyway.
    pub async fn create_product(&self, request: CreateProductRequest) -> Result<Product> {
        let new_product = request.into_new_product()?;

        match self.store.user_exists(new_product.user_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!(user_id = new_product.user_id, "User not found");
                return Err(AppError::BadRequest("Invalid user_id".to_string()));
            }
            Err(e) => {
                error!(user_id = new_product.user_id, error = %e, "Failed to look up user");
                return Err(AppError::Internal(CREATE_FAILED.to_string()));
            }
        }

        let product = self.store.create_product(&new_product).await.map_err(|e| {
            error!(user_id = new_product.user_id, error = %e, "Failed to create product");
            AppError::Internal(CREATE_FAILED.to_string())
        })?;

        let product_id = product.product_id;
        self.publisher
            .publish_product_created(product_id)
            .await
            .map_err(|e| {
                error!(product_id, error = %e, "Failed to publish product creation message");
                AppError::Internal(CREATE_FAILED.to_string())
            })?;

        info!(
            product_id,
            user_id = product.user_id,
            images = product.images.len(),
            "Product created"
        );
        Ok(product)
    }

    /// Cache-aside lookup of a single product
    pub async fn get_product(&self, product_id: i64) -> Result<Product> {
        let key = product_key(product_id);

        if let Some(product) = self.cached_product(product_id, &key).await {
            return Ok(product);
        }

        let product = self
            .store
            .get_product(product_id)
            .await
            .map_err(|e| {
                error!(product_id, error = %e, "Failed to fetch product");
                AppError::Internal("Error fetching product".to_string())
            })?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        self.refill_cache(product_id, &key, &product).await;

        Ok(product)
    }

    /// List a user's products with optional price and name filters
    ///
    /// Listing reads the store directly and never touches the cache.
    pub async fn list_products(&self, query: &ListProductsQuery) -> Result<Vec<Product>> {
        let filter = parse_filter(query)?;

        let products = self.store.list_products(&filter).await.map_err(|e| {
            error!(user_id = filter.user_id, error = %e, "Failed to fetch products");
            AppError::Internal("Error fetching products".to_string())
        })?;

        debug!(
            user_id = filter.user_id,
            count = products.len(),
            min_price = ?filter.min_price,
            max_price = ?filter.max_price,
            "Fetched products"
        );
        Ok(products)
    }

    /// Any cache failure, timeout or undecodable entry counts as a miss
    async fn cached_product(&self, product_id: i64, key: &str) -> Option<Product> {
        let lookup = with_timeout("cache.get", self.cache_timeout, self.cache.get(key)).await;

        let raw = match lookup {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                debug!(product_id, "Product not found in cache");
                metrics::record_cache_lookup("miss");
                return None;
            }
            Ok(Err(e)) => {
                warn!(product_id, error = %e, "Failed to fetch product from cache");
                metrics::record_cache_lookup("error");
                return None;
            }
            Err(e) => {
                warn!(product_id, error = %e, "Cache lookup timed out");
                metrics::record_cache_lookup("timeout");
                return None;
            }
        };

        match serde_json::from_str::<Product>(&raw) {
            Ok(product) => {
                debug!(product_id, "Product fetched from cache");
                metrics::record_cache_lookup("hit");
                Some(product)
            }
            Err(e) => {
                warn!(product_id, error = %e, "Failed to decode cached product");
                metrics::record_cache_lookup("decode_error");
                None
            }
        }
    }

    /// Best-effort write of a freshly loaded snapshot, without expiry
    async fn refill_cache(&self, product_id: i64, key: &str, product: &Product) {
        let payload = match serde_json::to_string(product) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(product_id, error = %e, "Failed to encode product for cache");
                metrics::record_cache_write("error");
                return;
            }
        };

        match with_timeout_result("cache.set", self.cache_timeout, self.cache.set(key, &payload))
            .await
        {
            Ok(()) => metrics::record_cache_write("ok"),
            Err(e) => {
                warn!(product_id, error = %e, "Failed to cache product");
                metrics::record_cache_write(if e.is_elapsed() { "timeout" } else { "error" });
            }
        }
    }
}

/// Turn raw listing parameters into a filter; empty values count as absent
pub fn parse_filter(query: &ListProductsQuery) -> Result<ProductFilter> {
    let user_id = match non_empty(&query.user_id) {
        None => return Err(AppError::BadRequest("Missing user_id parameter".to_string())),
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest("Invalid user_id parameter".to_string()))?,
    };

    let min_price = parse_price(&query.min_price, "Invalid min_price parameter")?;
    let max_price = parse_price(&query.max_price, "Invalid max_price parameter")?;

    Ok(ProductFilter {
        user_id,
        min_price,
        max_price,
        name_contains: non_empty(&query.product_name).map(str::to_string),
    })
}

fn parse_price(raw: &Option<String>, message: &str) -> Result<Option<f64>> {
    match non_empty(raw) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(message.to_string())),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
