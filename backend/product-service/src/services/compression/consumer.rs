//! Kafka consumer for the compression worker
//!
//! Messages are processed strictly one at a time. Offsets are auto-committed
//! on delivery, so a message whose pipeline fails or is interrupted is not
//! redelivered. A fatal broker error ends the message stream, which stops
//! the worker.

use super::service::CompressionPipeline;
use super::WorkerState;
use crate::config::KafkaConfig;
use crate::error::{AppError, Result};
use futures::{Stream, StreamExt};
use rdkafka::consumer::{Consumer, ConsumerContext, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{ClientConfig, ClientContext};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Whether a client error means the worker can no longer consume
///
/// `AllBrokersDown` is only raised once every broker connection has failed,
/// so a single dropped connection does not count.
pub fn is_fatal_broker_error(err: &KafkaError) -> bool {
    matches!(
        err.rdkafka_error_code(),
        Some(
            RDKafkaErrorCode::Fatal
                | RDKafkaErrorCode::AllBrokersDown
                | RDKafkaErrorCode::Authentication
        )
    )
}

/// Client context that flags fatal broker errors
///
/// librdkafka reports connection-level errors through the client context
/// rather than the message stream.
pub struct BrokerContext {
    fatal: watch::Sender<bool>,
}

impl BrokerContext {
    /// Context plus a receiver that turns `true` on the first fatal error
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (fatal, fatal_rx) = watch::channel(false);
        (Self { fatal }, fatal_rx)
    }

    pub fn mark_fatal(&self) {
        self.fatal.send_replace(true);
    }
}

impl ClientContext for BrokerContext {
    fn error(&self, error: KafkaError, reason: &str) {
        if is_fatal_broker_error(&error) {
            error!(error = %error, reason, "Fatal Kafka error, stopping consumer");
            self.mark_fatal();
        } else {
            warn!(error = %error, reason, "Kafka client error");
        }
    }
}

impl ConsumerContext for BrokerContext {}

/// End `payloads` once `fatal_rx` turns `true`
pub fn until_disconnected<S>(
    payloads: S,
    mut fatal_rx: watch::Receiver<bool>,
) -> impl Stream<Item = Vec<u8>>
where
    S: Stream<Item = Vec<u8>>,
{
    payloads.take_until(async move {
        // A dropped sender means the client is gone as well
        let _ = fatal_rx.wait_for(|fatal| *fatal).await;
    })
}

/// Payload of a delivered message, or `None` for a message without one
pub fn message_payload<M: Message>(msg: &M) -> Option<Vec<u8>> {
    match msg.payload() {
        Some(payload) => Some(payload.to_vec()),
        None => {
            warn!(
                topic = msg.topic(),
                partition = msg.partition(),
                offset = msg.offset(),
                "Skipping message without payload"
            );
            None
        }
    }
}

/// Kafka consumer feeding the compression pipeline
pub struct CompressionConsumer {
    consumer: StreamConsumer<BrokerContext>,
    pipeline: Arc<CompressionPipeline>,
    shutdown_rx: watch::Receiver<bool>,
    fatal_rx: watch::Receiver<bool>,
}

impl CompressionConsumer {
    /// Create a consumer subscribed to the compression topic
    ///
    /// Fails when no broker answers a metadata request for the topic within
    /// the connect timeout.
    pub fn new(
        config: &KafkaConfig,
        pipeline: Arc<CompressionPipeline>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        let (context, fatal_rx) = BrokerContext::new();

        let consumer: StreamConsumer<BrokerContext> = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create_with_context(context)
            .map_err(|e| AppError::QueueError(format!("Failed to create Kafka consumer: {e}")))?;

        consumer
            .fetch_metadata(Some(&config.topic), config.connect_timeout())
            .map_err(|e| {
                AppError::QueueError(format!(
                    "Kafka brokers '{}' unreachable for topic '{}': {e}",
                    config.brokers, config.topic
                ))
            })?;

        consumer
            .subscribe(&[&config.topic])
            .map_err(|e| AppError::QueueError(format!("Failed to subscribe to topic: {e}")))?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "Compression consumer initialized"
        );

        Ok(Self {
            consumer,
            pipeline,
            shutdown_rx,
            fatal_rx,
        })
    }

    /// Run the consumer loop until shutdown, a fatal broker error, or the
    /// end of the stream
    ///
    /// Returns an error when the loop ended because the broker was lost.
    pub async fn run(&self) -> Result<()> {
        info!("Starting compression consumer loop");

        let context = self.consumer.context().clone();
        let payloads = self.consumer.stream().filter_map(move |message| {
            let context = context.clone();
            async move {
                match message {
                    Ok(msg) => message_payload(&msg),
                    Err(e) => {
                        error!(error = %e, "Kafka consumer error");
                        if is_fatal_broker_error(&e) {
                            context.mark_fatal();
                        }
                        None
                    }
                }
            }
        });
        let payloads = until_disconnected(payloads, self.fatal_rx.clone());

        let handled =
            consume_payloads(&self.pipeline, Box::pin(payloads), self.shutdown_rx.clone()).await;

        info!(handled, "Compression consumer stopped");

        if *self.fatal_rx.borrow() {
            return Err(AppError::QueueError(
                "Lost connection to Kafka brokers".to_string(),
            ));
        }
        Ok(())
    }
}

/// Drive the pipeline over a stream of message payloads
///
/// Each payload is processed to completion before the next is polled. A
/// shutdown signal stops the loop immediately and drops the in-flight
/// pipeline. Returns the number of payloads taken off the stream.
pub async fn consume_payloads<S>(
    pipeline: &CompressionPipeline,
    mut payloads: S,
    mut shutdown_rx: watch::Receiver<bool>,
) -> usize
where
    S: Stream<Item = Vec<u8>> + Unpin,
{
    let mut handled = 0usize;

    loop {
        if *shutdown_rx.borrow() {
            info!("Shutdown signal received, stopping consumer");
            break;
        }

        let payload = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received, stopping consumer");
                    break;
                }
                continue;
            }
            next = payloads.next() => match next {
                Some(payload) => payload,
                None => {
                    warn!("Message stream ended");
                    break;
                }
            },
        };

        handled += 1;
        pipeline.set_state(WorkerState::Consuming);

        let processing = pipeline.handle_message(&payload);
        tokio::pin!(processing);

        let interrupted = loop {
            tokio::select! {
                report = &mut processing => {
                    if let Some(report) = report {
                        info!(
                            product_id = report.product_id,
                            outcome = report.outcome(),
                            attempted = report.attempted,
                            persisted = report.persisted.len(),
                            failed = report.failures.len(),
                            invalidated = report.invalidated,
                            "Compression message processed"
                        );
                    }
                    break false;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break true;
                    }
                }
            }
        };

        if interrupted {
            warn!("Shutdown during processing, dropping in-flight message");
            break;
        }
    }

    pipeline.set_state(WorkerState::Stopped);
    handled
}
