//! Compression Worker - Kafka consumer for product image compression
//!
//! Consumes product ids from Kafka, re-encodes every source image of the
//! product as JPEG, uploads the copies to S3, records them in Postgres and
//! invalidates the product's cache entry.
//!
//! Environment variables (see `Config::from_env` for the full list):
//! - DATABASE_URL, REDIS_URL: store and cache
//! - KAFKA_BROKERS, KAFKA_TOPIC, KAFKA_GROUP_ID: queue
//! - S3_BUCKET, AWS_REGION, S3_ENDPOINT: blob store
//! - WORKER_JPEG_QUALITY: JPEG quality 1-100 (default: 75)
//! - WORKER_MAX_CONCURRENCY: per-message image tasks, 0 = unbounded (default: 16)
//! - WORKER_COMMIT_POLICY: best_effort | all_or_nothing (default: best_effort)

use anyhow::Context;
use product_service::cache::RedisProductCache;
use product_service::db::PgProductStore;
use product_service::services::compression::{
    CompressionConsumer, CompressionPipeline, HttpImageFetcher, PipelineOptions, S3BlobStore,
};
use product_service::Config;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    product_service::logging::init("compression_worker");

    info!("Starting Compression Worker");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        bucket = %config.s3.bucket,
        kafka_brokers = %config.kafka.brokers,
        kafka_topic = %config.kafka.topic,
        max_concurrency = config.worker.max_concurrency,
        commit_policy = %config.worker.commit_policy,
        "Configuration loaded"
    );

    let store = PgProductStore::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    let cache = RedisProductCache::connect(&config.cache.redis_url)
        .await
        .context("Failed to connect to Redis")?;

    let fetcher = HttpImageFetcher::new(config.worker.fetch_timeout())
        .context("Failed to create HTTP client")?;

    let blobs = S3BlobStore::from_config(config.s3.clone()).await;
    info!("S3 client initialized");

    let pipeline = Arc::new(CompressionPipeline::new(
        Arc::new(store),
        Arc::new(cache),
        Arc::new(fetcher),
        Arc::new(blobs),
        PipelineOptions::from_config(&config),
    ));

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let consumer = CompressionConsumer::new(&config.kafka, pipeline, shutdown_rx)
        .context("Failed to create Kafka consumer")?;

    if let Err(e) = consumer.run().await {
        error!(error = %e, "Consumer error");
        return Err(e).context("Compression consumer failed");
    }

    info!("Compression Worker stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
