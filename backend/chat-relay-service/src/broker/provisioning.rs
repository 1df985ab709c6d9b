//! Topic auto-creation.
//!
//! Missing topics are the one broker failure the service repairs on its own:
//! the topic is created and the interrupted operation resumes once.

use crate::error::{AppError, AppResult};
use crate::metrics::ChatMetrics;
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait TopicProvisioner: Send + Sync {
    /// Create every topic in `topics` that does not exist yet.
    async fn ensure_topics(&self, topics: &[String]) -> AppResult<()>;
}

/// True when the broker reports the topic (or its partition) as unknown.
pub fn is_unknown_topic(err: &KafkaError) -> bool {
    matches!(
        err.rdkafka_error_code(),
        Some(RDKafkaErrorCode::UnknownTopicOrPartition) | Some(RDKafkaErrorCode::UnknownTopic)
    )
}

/// Run `send`. If the broker reports `topic` missing, create it and run
/// `send` exactly once more. Send failures become `Publish`; a failed
/// creation is returned as `TopicProvisioning`.
pub async fn send_creating_topic<T, F, Fut>(
    provisioner: &dyn TopicProvisioner,
    topic: &str,
    mut send: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, KafkaError>>,
{
    let result = match send().await {
        Err(e) if is_unknown_topic(&e) => {
            warn!(topic, "Kafka topic not found, creating it before retrying");
            provisioner.ensure_topics(&[topic.to_string()]).await?;
            send().await
        }
        other => other,
    };

    result.map_err(|e| AppError::Publish(format!("send to {}: {}", topic, e)))
}

/// Consumer-side recovery: create the literal `topics` after an
/// unknown-topic error. `None` means `err` was something else.
pub async fn recover_missing_topics(
    provisioner: &dyn TopicProvisioner,
    topics: &[String],
    err: &KafkaError,
) -> Option<AppResult<()>> {
    if !is_unknown_topic(err) {
        return None;
    }
    warn!(topics = ?topics, "Topics not found, attempting to create them");
    Some(provisioner.ensure_topics(topics).await)
}

pub struct KafkaTopicProvisioner {
    admin: AdminClient<DefaultClientContext>,
    partitions: i32,
    replication: i32,
    metrics: ChatMetrics,
}

impl KafkaTopicProvisioner {
    pub fn new(
        brokers: &str,
        partitions: i32,
        replication: i32,
        metrics: ChatMetrics,
    ) -> AppResult<Self> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("request.timeout.ms", "5000")
            .create()
            .map_err(|e| {
                AppError::StartServer(format!("Failed to create Kafka admin client: {}", e))
            })?;

        Ok(Self {
            admin,
            partitions,
            replication,
            metrics,
        })
    }
}

#[async_trait]
impl TopicProvisioner for KafkaTopicProvisioner {
    async fn ensure_topics(&self, topics: &[String]) -> AppResult<()> {
        if topics.is_empty() {
            return Ok(());
        }

        let new_topics: Vec<NewTopic<'_>> = topics
            .iter()
            .map(|topic| {
                NewTopic::new(
                    topic,
                    self.partitions,
                    TopicReplication::Fixed(self.replication),
                )
            })
            .collect();
        let options = AdminOptions::new().operation_timeout(Some(Duration::from_secs(10)));

        let results = self
            .admin
            .create_topics(&new_topics, &options)
            .await
            .map_err(|e| AppError::TopicProvisioning(format!("create topics: {}", e)))?;

        for result in results {
            match result {
                Ok(topic) => {
                    self.metrics.topics_provisioned.inc();
                    info!(topic = %topic, partitions = self.partitions, "Created Kafka topic");
                }
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    info!(topic = %topic, "Kafka topic already exists");
                }
                Err((topic, code)) => {
                    warn!(topic = %topic, error = %code, "Failed to create Kafka topic");
                    return Err(AppError::TopicProvisioning(format!(
                        "create topic {}: {}",
                        topic, code
                    )));
                }
            }
        }

        Ok(())
    }
}
