use super::provisioning::{send_creating_topic, TopicProvisioner};
use super::topic::PublishTarget;
use crate::error::{AppError, AppResult};
use crate::models::PrivateMessageEvent;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::sync::Arc;
use std::time::Duration;

pub const EVENT_TYPE: &str = "chat.private_message";

/// Sending side of the broker bridge.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    /// Publish one private-message event. Delivery is at-least-once.
    async fn publish(&self, target: &PublishTarget, event: &PrivateMessageEvent) -> AppResult<()>;
}

/// Kafka producer for private-message events
#[derive(Clone)]
pub struct KafkaPublisher {
    producer: FutureProducer,
    provisioner: Arc<dyn TopicProvisioner>,
    delivery_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(
        brokers: &str,
        message_timeout_ms: u64,
        provisioner: Arc<dyn TopicProvisioner>,
    ) -> AppResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", message_timeout_ms.to_string())
            .set("acks", "all")
            .set("retries", "3")
            .set("retry.backoff.ms", "100")
            .create()
            .map_err(|e| AppError::StartServer(format!("Failed to create Kafka producer: {}", e)))?;

        tracing::info!(brokers = %brokers, "KafkaPublisher initialized");

        Ok(Self {
            producer,
            provisioner,
            delivery_timeout: Duration::from_millis(message_timeout_ms),
        })
    }

    async fn send(
        &self,
        target: &PublishTarget,
        event: &PrivateMessageEvent,
        payload: &str,
    ) -> Result<(i32, i64), KafkaError> {
        let message_id = event.message_id.to_string();
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "event_type",
                value: Some(EVENT_TYPE.as_bytes()),
            })
            .insert(Header {
                key: "message_id",
                value: Some(message_id.as_bytes()),
            });

        let record = FutureRecord::to(&target.topic)
            .key(&target.key)
            .payload(payload)
            .headers(headers);

        self.producer
            .send(record, self.delivery_timeout)
            .await
            .map_err(|(e, _)| e)
    }
}

#[async_trait]
impl BrokerPublisher for KafkaPublisher {
    async fn publish(&self, target: &PublishTarget, event: &PrivateMessageEvent) -> AppResult<()> {
        let payload = event
            .to_json()
            .map_err(|e| AppError::Publish(format!("serialize event: {}", e)))?;

        let (partition, offset) =
            send_creating_topic(self.provisioner.as_ref(), &target.topic, || {
                self.send(target, event, &payload)
            })
            .await?;

        tracing::debug!(
            message_id = %event.message_id,
            topic = %target.topic,
            partition = partition,
            offset = offset,
            "Private message published to Kafka"
        );
        Ok(())
    }
}
