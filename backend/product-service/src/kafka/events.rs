use super::ProductEventPublisher;
use crate::config::KafkaConfig;
use crate::error::{AppError, Result};
use anyhow::Context;
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Message body for a product id: its decimal text, UTF-8
pub fn encode_product_id(product_id: i64) -> String {
    product_id.to_string()
}

/// Parse a message body back into a product id
///
/// Surrounding whitespace is tolerated; anything else that is not a base-10
/// integer yields `None`.
pub fn decode_product_id(payload: &[u8]) -> Option<i64> {
    std::str::from_utf8(payload).ok()?.trim().parse().ok()
}

/// Kafka producer for product compression requests.
///
/// Delivery is bounded only by `message.timeout.ms`: a send resolves once
/// librdkafka has either delivered the record or given up on it, so an error
/// returned here means the record was not written.
#[derive(Clone)]
pub struct KafkaProductPublisher {
    inner: Arc<FutureProducer>,
    topic: String,
}

impl KafkaProductPublisher {
    /// Create the producer and check that the broker answers for the topic
    pub fn new(config: &KafkaConfig) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", config.publish_timeout_ms.to_string())
            .create()
            .with_context(|| format!("Failed to create Kafka producer for '{}'", config.topic))?;

        producer
            .client()
            .fetch_metadata(Some(&config.topic), config.connect_timeout())
            .with_context(|| {
                format!(
                    "Kafka brokers '{}' unreachable for topic '{}'",
                    config.brokers, config.topic
                )
            })?;

        info!(brokers = %config.brokers, topic = %config.topic, "Kafka producer connected");

        Ok(Self {
            inner: Arc::new(producer),
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl ProductEventPublisher for KafkaProductPublisher {
    async fn publish_product_created(&self, product_id: i64) -> Result<()> {
        let body = encode_product_id(product_id);

        let record = FutureRecord::to(&self.topic).key(&body).payload(&body);

        // Zero enqueue wait: a full local queue fails at once
        match self.inner.send(record, Duration::ZERO).await {
            Ok((partition, offset)) => {
                debug!(product_id, partition, offset, "Published compression request");
                Ok(())
            }
            Err((err, _)) => {
                error!(product_id, error = %err, "Failed to publish compression request");
                Err(AppError::QueueError(err.to_string()))
            }
        }
    }
}
