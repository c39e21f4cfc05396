//! Prometheus metrics for product-service
//!
//! Tracks the cache-aside read path, cache invalidation, and the compression
//! pipeline. Both binaries register into the default registry.

use actix_web::HttpResponse;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};
use std::time::Duration;

lazy_static::lazy_static! {
    /// Product cache lookups by outcome (hit/miss/decode_error/error/timeout)
    static ref CACHE_LOOKUPS: IntCounterVec = register_int_counter_vec!(
        "product_cache_lookups_total",
        "Product cache lookups by outcome",
        &["outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Product cache refills after a miss
    static ref CACHE_WRITES: IntCounterVec = register_int_counter_vec!(
        "product_cache_writes_total",
        "Product cache writes by outcome",
        &["outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Cache invalidations issued by the compression worker
    static ref CACHE_INVALIDATIONS: IntCounterVec = register_int_counter_vec!(
        "product_cache_invalidations_total",
        "Product cache invalidations by outcome",
        &["outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Per-image outcomes; `stage` is `ok` for successes
    static ref IMAGES_PROCESSED: IntCounterVec = register_int_counter_vec!(
        "product_images_compressed_total",
        "Images processed by the compression worker",
        &["stage"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Queue messages by outcome
    static ref MESSAGES_PROCESSED: IntCounterVec = register_int_counter_vec!(
        "product_compression_messages_total",
        "Compression messages handled by outcome",
        &["outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Wall time of one message, fetch through invalidation
    static ref PIPELINE_DURATION: Histogram = register_histogram!(
        "product_compression_pipeline_duration_seconds",
        "Time to process one compression message",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).expect("Prometheus metrics registration should succeed at startup");
}

pub fn record_cache_lookup(outcome: &str) {
    CACHE_LOOKUPS.with_label_values(&[outcome]).inc();
}

pub fn record_cache_write(outcome: &str) {
    CACHE_WRITES.with_label_values(&[outcome]).inc();
}

pub fn record_invalidation(success: bool) {
    let outcome = if success { "ok" } else { "error" };
    CACHE_INVALIDATIONS.with_label_values(&[outcome]).inc();
}

pub fn record_image(stage: &str) {
    IMAGES_PROCESSED.with_label_values(&[stage]).inc();
}

pub fn record_message(outcome: &str) {
    MESSAGES_PROCESSED.with_label_values(&[outcome]).inc();
}

pub fn observe_pipeline(elapsed: Duration) {
    PIPELINE_DURATION.observe(elapsed.as_secs_f64());
}

/// `GET /metrics` in the Prometheus text format
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
