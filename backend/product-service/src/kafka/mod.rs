//! Kafka integration for product-service
//!
//! - Events: wire format of the compression request (the decimal product id)
//! - Producer seam used by the API after a product is committed

pub mod events;

pub use events::{decode_product_id, encode_product_id, KafkaProductPublisher};

use crate::error::Result;
use async_trait::async_trait;

/// Publishes compression requests for newly created products
#[async_trait]
pub trait ProductEventPublisher: Send + Sync {
    /// Enqueue a compression request; returns once the broker acknowledged it
    async fn publish_product_created(&self, product_id: i64) -> Result<()>;
}
