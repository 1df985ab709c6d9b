use crate::error::AppError;
use crate::session::SessionId;
use std::fmt;
use std::str::FromStr;

/// Broker routing key derived from an ordered (sender, target) pair.
///
/// Deliberately not symmetric: A→B and B→A produce different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationTopic(String);

impl ConversationTopic {
    pub const DEFAULT_PREFIX: &'static str = "conversation";

    pub fn derive(sender: SessionId, target: SessionId) -> Self {
        Self::with_prefix(Self::DEFAULT_PREFIX, sender, target)
    }

    pub fn with_prefix(prefix: &str, sender: SessionId, target: SessionId) -> Self {
        Self(format!("{prefix}_{sender}_{target}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a single record is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub topic: String,
    pub key: String,
}

/// How conversations map onto Kafka topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicStrategy {
    /// All conversations share one topic; the conversation topic becomes the
    /// record key so a pair keeps its partition.
    Shared { topic: String },
    /// One topic per ordered pair. Consumers subscribe by regex so topics
    /// created after startup are picked up on the next metadata refresh.
    PerConversation { prefix: String },
}

impl TopicStrategy {
    pub fn shared(topic: impl Into<String>) -> Self {
        TopicStrategy::Shared {
            topic: topic.into(),
        }
    }

    pub fn per_conversation(prefix: impl Into<String>) -> Self {
        TopicStrategy::PerConversation {
            prefix: prefix.into(),
        }
    }

    pub fn target_for(&self, sender: SessionId, target: SessionId) -> PublishTarget {
        match self {
            TopicStrategy::Shared { topic } => PublishTarget {
                topic: topic.clone(),
                key: ConversationTopic::derive(sender, target).to_string(),
            },
            TopicStrategy::PerConversation { prefix } => {
                let conversation = ConversationTopic::with_prefix(prefix, sender, target);
                PublishTarget {
                    topic: conversation.to_string(),
                    key: conversation.to_string(),
                }
            }
        }
    }

    /// Subscription list handed to the consumer. Entries starting with `^`
    /// are regex patterns (librdkafka convention).
    pub fn subscription(&self) -> Vec<String> {
        match self {
            TopicStrategy::Shared { topic } => vec![topic.clone()],
            TopicStrategy::PerConversation { prefix } => {
                // '.' is the only regex metacharacter a legal topic name can hold
                vec![format!("^{}_.*", prefix.replace('.', "\\."))]
            }
        }
    }

    /// Literal topics that may be created when the consumer reports them
    /// missing. Pattern subscriptions have nothing to pre-create.
    pub fn provisionable_topics(&self) -> Vec<String> {
        self.subscription()
            .into_iter()
            .filter(|topic| !topic.starts_with('^'))
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            TopicStrategy::Shared { .. } => "shared",
            TopicStrategy::PerConversation { .. } => "per-conversation",
        }
    }
}

/// Whether `name` only uses characters Kafka accepts in topic names.
pub fn is_legal_topic_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 249
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Strategy kind as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicStrategyKind {
    Shared,
    PerConversation,
}

impl FromStr for TopicStrategyKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shared" => Ok(TopicStrategyKind::Shared),
            "per-conversation" | "per_conversation" => Ok(TopicStrategyKind::PerConversation),
            other => Err(AppError::Config(format!(
                "unknown topic strategy '{other}' (expected 'shared' or 'per-conversation')"
            ))),
        }
    }
}
