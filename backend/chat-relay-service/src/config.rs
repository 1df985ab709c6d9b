use crate::broker::{is_legal_topic_name, ConversationTopic, TopicStrategy, TopicStrategyKind};
use crate::error::AppError;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub consumer_group: String,
    pub topic_strategy: TopicStrategy,
    pub topic_partitions: i32,
    pub topic_replication: i32,
    pub message_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: usize,
    /// Let `/ws?session_id=` reclaim an offline session id and its history.
    /// Ids are not authenticated, so this stays off unless asked for.
    pub session_resume_enabled: bool,
    pub kafka: KafkaConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key/value source. Unset keys take their
    /// defaults; set but malformed values are a `Config` error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "PORT", 3000)?;
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "postgres://localhost/chatapp".to_string());
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 16)?;
        let session_resume_enabled = parse_or(&lookup, "SESSION_RESUME_ENABLED", false)?;

        let kind: TopicStrategyKind = lookup("KAFKA_TOPIC_STRATEGY")
            .unwrap_or_else(|| "shared".to_string())
            .parse()?;
        let topic_strategy = match kind {
            TopicStrategyKind::Shared => TopicStrategy::shared(topic_name_or(
                &lookup,
                "KAFKA_PRIVATE_MESSAGE_TOPIC",
                "chat.private-messages",
            )?),
            TopicStrategyKind::PerConversation => TopicStrategy::per_conversation(topic_name_or(
                &lookup,
                "KAFKA_CONVERSATION_TOPIC_PREFIX",
                ConversationTopic::DEFAULT_PREFIX,
            )?),
        };

        let kafka = KafkaConfig {
            brokers: lookup("KAFKA_BROKERS").unwrap_or_else(|| "localhost:9092".to_string()),
            consumer_group: lookup("KAFKA_CONSUMER_GROUP")
                .unwrap_or_else(|| "chatAppGroup".to_string()),
            topic_strategy,
            topic_partitions: parse_or(&lookup, "KAFKA_TOPIC_PARTITIONS", 1)?,
            topic_replication: parse_or(&lookup, "KAFKA_TOPIC_REPLICATION", 1)?,
            message_timeout_ms: parse_or(&lookup, "KAFKA_MESSAGE_TIMEOUT_MS", 5000)?,
        };

        if kafka.topic_partitions < 1 || kafka.topic_replication < 1 {
            return Err(AppError::Config(
                "KAFKA_TOPIC_PARTITIONS and KAFKA_TOPIC_REPLICATION must be at least 1".into(),
            ));
        }

        Ok(Self {
            port,
            database_url,
            db_max_connections,
            session_resume_enabled,
            kafka,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has invalid value '{raw}'"))),
    }
}

fn topic_name_or<F>(lookup: &F, key: &str, default: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let name = lookup(key)
        .map(|raw| raw.trim().to_string())
        .unwrap_or_else(|| default.to_string());
    if !is_legal_topic_name(&name) {
        return Err(AppError::Config(format!(
            "{key} '{name}' may only contain ASCII letters, digits, '.', '_' and '-'"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.database_url, "postgres://localhost/chatapp");
        assert_eq!(cfg.db_max_connections, 16);
        assert_eq!(cfg.kafka.brokers, "localhost:9092");
        assert_eq!(cfg.kafka.consumer_group, "chatAppGroup");
        assert_eq!(cfg.kafka.message_timeout_ms, 5000);
        assert!(!cfg.session_resume_enabled);
        assert_eq!(
            cfg.kafka.topic_strategy,
            TopicStrategy::shared("chat.private-messages")
        );
    }

    #[test]
    fn per_conversation_strategy_uses_prefix() {
        let cfg = config_from(&[
            ("KAFKA_TOPIC_STRATEGY", "per-conversation"),
            ("KAFKA_CONVERSATION_TOPIC_PREFIX", "dm"),
        ])
        .unwrap();
        assert_eq!(cfg.kafka.topic_strategy, TopicStrategy::per_conversation("dm"));
    }

    #[test]
    fn numbers_are_parsed() {
        let cfg = config_from(&[("PORT", " 8080 "), ("DB_MAX_CONNECTIONS", "8")]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.db_max_connections, 8);
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = config_from(&[("PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn session_resume_is_opt_in() {
        let cfg = config_from(&[("SESSION_RESUME_ENABLED", "true")]).unwrap();
        assert!(cfg.session_resume_enabled);
        assert!(config_from(&[("SESSION_RESUME_ENABLED", "yes")]).is_err());
    }

    #[test]
    fn topic_prefix_with_illegal_characters_is_rejected() {
        let err = config_from(&[
            ("KAFKA_TOPIC_STRATEGY", "per-conversation"),
            ("KAFKA_CONVERSATION_TOPIC_PREFIX", "chat.*"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("KAFKA_CONVERSATION_TOPIC_PREFIX"));

        let cfg = config_from(&[
            ("KAFKA_TOPIC_STRATEGY", "per-conversation"),
            ("KAFKA_CONVERSATION_TOPIC_PREFIX", "chat.dm"),
        ])
        .unwrap();
        assert_eq!(cfg.kafka.topic_strategy.subscription(), vec![r"^chat\.dm_.*".to_string()]);
    }

    #[test]
    fn shared_topic_name_is_validated() {
        assert!(config_from(&[("KAFKA_PRIVATE_MESSAGE_TOPIC", "chat messages")]).is_err());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = config_from(&[("KAFKA_TOPIC_STRATEGY", "broadcast")]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn zero_partitions_is_rejected() {
        let err = config_from(&[("KAFKA_TOPIC_PARTITIONS", "0")]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
