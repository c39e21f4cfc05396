/// Configuration management for product-service
///
/// Loads configuration from environment variables with defaults. Values that
/// are present but malformed are rejected instead of silently defaulted.
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::services::compression::CommitPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub kafka: KafkaConfig,
    pub s3: S3Config,
    pub worker: WorkerConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
    /// Bound applied to every cache get, set and delete
    pub timeout_ms: u64,
}

impl CacheConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    /// Durable topic carrying product ids from the API to the worker
    pub topic: String,
    pub group_id: String,
    /// `message.timeout.ms` of the producer; the only bound on a publish
    pub publish_timeout_ms: u64,
    /// Bound on the startup metadata request; no answer within it is fatal
    pub connect_timeout_ms: u64,
}

impl KafkaConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    /// Overrides the `https://{bucket}.s3.amazonaws.com` public URL prefix
    pub public_base_url: Option<String>,
    pub upload_timeout_ms: u64,
}

impl S3Config {
    /// Public URL of an object key
    pub fn object_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("https://{}.s3.amazonaws.com/{}", self.bucket, key),
        }
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorkerConfig {
    /// JPEG quality factor (1-100)
    pub jpeg_quality: u8,
    /// Per-message cap on concurrent image tasks; 0 disables the cap
    pub max_concurrency: usize,
    pub commit_policy: CommitPolicy,
    pub fetch_timeout_ms: u64,
}

impl WorkerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 75,
            max_concurrency: 16,
            commit_policy: CommitPolicy::BestEffort,
            fetch_timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let worker_defaults = WorkerConfig::default();

        let jpeg_quality: u8 = parse_env("WORKER_JPEG_QUALITY", worker_defaults.jpeg_quality)?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(ConfigError::Invalid {
                key: "WORKER_JPEG_QUALITY",
                value: jpeg_quality.to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        Ok(Config {
            app: AppConfig {
                host: env_or("PRODUCT_SERVICE_HOST", "0.0.0.0"),
                port: parse_env("PRODUCT_SERVICE_PORT", 8000)?,
                env: env_or("APP_ENV", "development"),
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", "postgresql://localhost/products"),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            cache: CacheConfig {
                redis_url: env_or("REDIS_URL", "redis://localhost"),
                timeout_ms: parse_env("CACHE_TIMEOUT_MS", 1000)?,
            },
            kafka: KafkaConfig {
                brokers: env_or("KAFKA_BROKERS", "localhost:9092"),
                topic: env_or("KAFKA_TOPIC", "products.compression"),
                group_id: env_or("KAFKA_GROUP_ID", "compression-worker"),
                publish_timeout_ms: parse_env("KAFKA_PUBLISH_TIMEOUT_MS", 5000)?,
                connect_timeout_ms: parse_env("KAFKA_CONNECT_TIMEOUT_MS", 5000)?,
            },
            s3: S3Config {
                bucket: env_or("S3_BUCKET", "product-images"),
                region: env_or("AWS_REGION", "us-east-1"),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
                public_base_url: std::env::var("S3_PUBLIC_BASE_URL").ok(),
                upload_timeout_ms: parse_env("S3_UPLOAD_TIMEOUT_MS", 10_000)?,
            },
            worker: WorkerConfig {
                jpeg_quality,
                max_concurrency: parse_env("WORKER_MAX_CONCURRENCY", worker_defaults.max_concurrency)?,
                commit_policy: parse_env("WORKER_COMMIT_POLICY", worker_defaults.commit_policy)?,
                fetch_timeout_ms: parse_env("IMAGE_FETCH_TIMEOUT_MS", worker_defaults.fetch_timeout_ms)?,
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3(public_base_url: Option<&str>) -> S3Config {
        S3Config {
            bucket: "product-images".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            endpoint: None,
            public_base_url: public_base_url.map(str::to_string),
            upload_timeout_ms: 1000,
        }
    }

    #[test]
    fn test_object_url_virtual_hosted_style() {
        let url = s3(None).object_url("compressed_images/7_cat.png");
        assert_eq!(
            url,
            "https://product-images.s3.amazonaws.com/compressed_images/7_cat.png"
        );
    }

    #[test]
    fn test_object_url_custom_base() {
        let url = s3(Some("http://localhost:9000/product-images/"))
            .object_url("compressed_images/7_cat.png");
        assert_eq!(
            url,
            "http://localhost:9000/product-images/compressed_images/7_cat.png"
        );
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        let err = parse_value::<u64>("CACHE_TIMEOUT_MS", "soon").unwrap_err();
        assert!(err.to_string().contains("CACHE_TIMEOUT_MS"));
    }

    #[test]
    fn test_parse_value_commit_policy() {
        let policy: CommitPolicy = parse_value("WORKER_COMMIT_POLICY", "all_or_nothing").unwrap();
        assert_eq!(policy, CommitPolicy::AllOrNothing);
    }

    #[test]
    fn test_worker_defaults() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.jpeg_quality, 75);
        assert_eq!(worker.commit_policy, CommitPolicy::BestEffort);
    }
}
