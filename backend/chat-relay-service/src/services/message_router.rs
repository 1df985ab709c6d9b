//! Private message pipeline: validate the sender, persist, then publish.
//!
//! Persistence always completes before publication is attempted. A publish
//! failure does not undo the stored row; the broker relay is best-effort.

use crate::broker::{BrokerPublisher, TopicStrategy};
use crate::error::{AppError, AppResult};
use crate::metrics::ChatMetrics;
use crate::models::{Message, PrivateMessageEvent};
use crate::services::message_store::MessageStore;
use crate::session::{SessionId, SessionRegistry};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct MessageRouter {
    registry: SessionRegistry,
    store: Arc<dyn MessageStore>,
    publisher: Arc<dyn BrokerPublisher>,
    topics: TopicStrategy,
    metrics: ChatMetrics,
}

impl MessageRouter {
    pub fn new(
        registry: SessionRegistry,
        store: Arc<dyn MessageStore>,
        publisher: Arc<dyn BrokerPublisher>,
        topics: TopicStrategy,
        metrics: ChatMetrics,
    ) -> Self {
        Self {
            registry,
            store,
            publisher,
            topics,
            metrics,
        }
    }

    pub async fn route(
        &self,
        sender_id: SessionId,
        target_id: SessionId,
        body: impl Into<String>,
    ) -> AppResult<()> {
        let Some(sender) = self.registry.lookup(sender_id).await else {
            self.metrics.sender_unknown.inc();
            warn!(sender_id = %sender_id, "Rejecting private message from unregistered session");
            return Err(AppError::SenderUnknown(sender_id));
        };

        let message = Message::new(sender_id, target_id, sender.display_name, body);

        if let Err(e) = self.store.append(&message).await {
            self.metrics.persistence_failures.inc();
            error!(
                error = %e,
                sender_id = %sender_id,
                receiver_id = %target_id,
                "Error saving message to the database"
            );
            return Err(match e {
                AppError::Persistence(_) => e,
                other => AppError::Persistence(other.to_string()),
            });
        }
        self.metrics.messages_persisted.inc();

        let target = self.topics.target_for(sender_id, target_id);
        let event = PrivateMessageEvent::from(&message);

        match self.publisher.publish(&target, &event).await {
            Ok(()) => {
                debug!(
                    message_id = %message.id,
                    topic = %target.topic,
                    "Message relayed to broker"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.publish_failures.inc();
                error!(
                    error = %e,
                    message_id = %message.id,
                    topic = %target.topic,
                    "Error sending message to Kafka (message remains stored)"
                );
                Err(match e {
                    AppError::Publish(_) | AppError::TopicProvisioning(_) => e,
                    other => AppError::Publish(other.to_string()),
                })
            }
        }
    }
}
