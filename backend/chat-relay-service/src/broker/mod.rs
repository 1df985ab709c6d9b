//! Kafka bridge: producing relayed messages and consuming them on every
//! instance.

pub mod consumer;
pub mod producer;
pub mod provisioning;
pub mod topic;

pub use consumer::{
    DispatchOutcome, MessageDispatcher, PrivateMessageConsumer, PrivateMessageConsumerConfig,
};
pub use producer::{BrokerPublisher, KafkaPublisher};
pub use provisioning::{KafkaTopicProvisioner, TopicProvisioner};
pub use topic::{
    is_legal_topic_name, ConversationTopic, PublishTarget, TopicStrategy, TopicStrategyKind,
};
