//! Image compression pipeline
//!
//! This module provides:
//! - Fetcher for source images over HTTP
//! - JPEG re-encoder running on the blocking pool
//! - Blob store for uploading compressed copies to S3
//! - Pipeline coordinating fan-out, persistence and cache invalidation
//! - Kafka consumer driving the pipeline one message at a time

pub mod consumer;
pub mod fetcher;
pub mod processor;
pub mod service;
pub mod storage;

pub use consumer::{
    consume_payloads, is_fatal_broker_error, until_disconnected, BrokerContext, CompressionConsumer,
};
pub use fetcher::{HttpImageFetcher, ImageFetcher};
pub use processor::JpegCompressor;
pub use service::{
    CompressionError, CompressionPipeline, CompressionReport, ImageStage, PipelineOptions,
};
pub use storage::{compressed_key, original_filename, BlobStore, S3BlobStore};

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// What to persist when only some images of a product compressed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Persist every successful upload even if siblings failed
    #[default]
    BestEffort,
    /// Persist nothing unless every image succeeded
    AllOrNothing,
}

impl FromStr for CommitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best_effort" => Ok(CommitPolicy::BestEffort),
            "all_or_nothing" => Ok(CommitPolicy::AllOrNothing),
            other => Err(format!(
                "unknown commit policy '{other}' (expected best_effort or all_or_nothing)"
            )),
        }
    }
}

impl fmt::Display for CommitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitPolicy::BestEffort => write!(f, "best_effort"),
            CommitPolicy::AllOrNothing => write!(f, "all_or_nothing"),
        }
    }
}

/// Lifecycle of the worker, published on a `watch` channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Consuming,
    Fetching,
    Compressing,
    Aggregating,
    Persisting,
    Invalidating,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Consuming => "consuming",
            WorkerState::Fetching => "fetching",
            WorkerState::Compressing => "compressing",
            WorkerState::Aggregating => "aggregating",
            WorkerState::Persisting => "persisting",
            WorkerState::Invalidating => "invalidating",
            WorkerState::Stopped => "stopped",
        }
    }
}
