//! Product Service
//!
//! HTTP API for products backed by Postgres with a Redis read cache, plus
//! a Kafka-driven worker that compresses product images into S3.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod kafka;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
