/// Caching layer for product-service
///
/// Product snapshots are cached as JSON under their decimal id with no
/// expiry. Entries leave the cache only through explicit invalidation by the
/// compression worker.
use crate::error::{AppError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

/// Cache key for a product snapshot
pub fn product_key(product_id: i64) -> String {
    product_id.to_string()
}

/// Key-value cache holding serialized product snapshots
#[async_trait]
pub trait ProductCache: Send + Sync {
    /// Raw value under `key`, `None` on a miss
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` without expiry
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; returns whether an entry existed
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Redis-backed product cache
#[derive(Clone)]
pub struct RedisProductCache {
    conn: ConnectionManager,
}

impl RedisProductCache {
    /// Initialize cache from Redis client
    pub async fn new(client: redis::Client) -> Result<Self> {
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to connect to Redis: {e}")))?;

        Ok(Self::with_manager(manager))
    }

    pub fn with_manager(manager: ConnectionManager) -> Self {
        Self { conn: manager }
    }

    /// Connect using a `redis://` URL
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::CacheError(format!("Invalid Redis URL: {e}")))?;
        Self::new(client).await
    }
}

#[async_trait]
impl ProductCache for RedisProductCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to read from cache: {e}")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set(key, value)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to write to cache: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: usize = conn
            .del(key)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to delete cache key: {e}")))?;

        debug!(key, removed, "Cache key deleted");
        Ok(removed > 0)
    }
}
