//! Kafka consumer for relayed private messages
//!
//! Every instance subscribes under the same consumer group. A record is
//! delivered only when its receiver is connected to this instance; records
//! for sessions living elsewhere are dropped here.
use super::provisioning::{recover_missing_topics, TopicProvisioner};
use super::topic::TopicStrategy;
use crate::error::{AppError, AppResult};
use crate::metrics::ChatMetrics;
use crate::models::PrivateMessageEvent;
use crate::session::SessionRegistry;
use crate::websocket::message_types::{DeliveredMessage, ServerEvent};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Consumer configuration
#[derive(Debug, Clone)]
pub struct PrivateMessageConsumerConfig {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topics or `^`-prefixed patterns to subscribe to
    pub subscription: Vec<String>,
    /// Literal topics to create when the broker reports them missing
    pub provisionable_topics: Vec<String>,
}

impl PrivateMessageConsumerConfig {
    pub fn for_strategy(brokers: &str, group_id: &str, strategy: &TopicStrategy) -> Self {
        Self {
            brokers: brokers.to_string(),
            group_id: group_id.to_string(),
            subscription: strategy.subscription(),
            provisionable_topics: strategy.provisionable_topics(),
        }
    }

    /// librdkafka settings for the consumer.
    ///
    /// Offsets reset to `earliest`: per-conversation topics are created by
    /// their first produce and only assigned on the next metadata refresh, so
    /// `latest` would skip everything written before the assignment. The
    /// group's committed offsets still prevent replays after a restart.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "30000")
            .set("enable.partition.eof", "false")
            // picks up per-conversation topics matching a pattern subscription
            .set("topic.metadata.refresh.interval.ms", "10000");
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Receiver is not connected here, or its socket closed mid-flight.
    NotLocal,
}

/// Turns consumed payloads into `private-message` emits.
#[derive(Clone)]
pub struct MessageDispatcher {
    registry: SessionRegistry,
    metrics: ChatMetrics,
}

impl MessageDispatcher {
    pub fn new(registry: SessionRegistry, metrics: ChatMetrics) -> Self {
        Self { registry, metrics }
    }

    pub async fn dispatch(&self, payload: &[u8]) -> AppResult<DispatchOutcome> {
        let event = PrivateMessageEvent::from_json(payload)
            .map_err(|e| AppError::BadRequest(format!("invalid private message payload: {}", e)))?;

        let Some(receiver) = self.registry.lookup(event.receiver_id).await else {
            self.metrics.broker_dropped.inc();
            debug!(
                message_id = %event.message_id,
                receiver_id = %event.receiver_id,
                "Receiver not connected to this instance, dropping"
            );
            return Ok(DispatchOutcome::NotLocal);
        };

        let delivered = receiver.handle.emit(ServerEvent::PrivateMessage(DeliveredMessage {
            sender_id: event.sender_id,
            sender_name: event.sender_name,
            body: event.body,
        }));

        if delivered {
            self.metrics.broker_delivered.inc();
            Ok(DispatchOutcome::Delivered)
        } else {
            self.metrics.broker_dropped.inc();
            Ok(DispatchOutcome::NotLocal)
        }
    }
}

pub struct PrivateMessageConsumer {
    consumer: StreamConsumer,
    dispatcher: MessageDispatcher,
    provisioner: Arc<dyn TopicProvisioner>,
    config: PrivateMessageConsumerConfig,
}

impl PrivateMessageConsumer {
    pub fn new(
        config: PrivateMessageConsumerConfig,
        dispatcher: MessageDispatcher,
        provisioner: Arc<dyn TopicProvisioner>,
    ) -> AppResult<Self> {
        info!(
            "Initializing PrivateMessageConsumer: brokers={}, group_id={}, subscription={:?}",
            config.brokers, config.group_id, config.subscription
        );

        let consumer: StreamConsumer = config
            .client_config()
            .create()
            .map_err(|e| AppError::StartServer(format!("Failed to create Kafka consumer: {}", e)))?;

        let topics: Vec<&str> = config.subscription.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| AppError::StartServer(format!("Failed to subscribe to topics: {}", e)))?;

        info!("Subscribed to Kafka topics: {:?}", config.subscription);

        Ok(Self {
            consumer,
            dispatcher,
            provisioner,
            config,
        })
    }

    /// Consume forever. Spawn this on a background task.
    pub async fn start_consuming(self: Arc<Self>) {
        info!("Starting PrivateMessageConsumer loop...");

        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    let Some(payload) = message.payload() else {
                        warn!("Received Kafka message with no payload, skipping");
                        continue;
                    };

                    match self.dispatcher.dispatch(payload).await {
                        Ok(outcome) => debug!(
                            topic = message.topic(),
                            offset = message.offset(),
                            ?outcome,
                            "Dispatched private message"
                        ),
                        Err(e) => error!(
                            topic = message.topic(),
                            offset = message.offset(),
                            error = %e,
                            "Failed to dispatch Kafka message"
                        ),
                    }
                }
                Err(e) => {
                    match recover_missing_topics(
                        self.provisioner.as_ref(),
                        &self.config.provisionable_topics,
                        &e,
                    )
                    .await
                    {
                        Some(Ok(())) => {}
                        Some(Err(pe)) => {
                            error!(error = %pe, "Error creating topics");
                            sleep(Duration::from_secs(5)).await;
                        }
                        None => {
                            error!("Kafka consumer error: {}", e);
                            sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
    }
}
