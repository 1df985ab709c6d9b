use crate::session::{SessionId, SessionState};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// A private message arrived from a session that never submitted a name
    /// (or has already disconnected).
    #[error("sender {0} is not registered")]
    SenderUnknown(SessionId),

    #[error("session {0} has no live connection")]
    SessionNotConnected(SessionId),

    #[error("invalid transition: cannot {event} while {from:?}")]
    InvalidTransition {
        from: SessionState,
        event: &'static str,
    },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("topic provisioning error: {0}")]
    TopicProvisioning(String),
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Persistence(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        AppError::Persistence(e.to_string())
    }
}

impl AppError {
    /// Whether the message that triggered this error is still durably stored.
    pub fn message_persisted(&self) -> bool {
        matches!(self, AppError::Publish(_) | AppError::TopicProvisioning(_))
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_failures_keep_the_stored_message() {
        assert!(AppError::Publish("broker down".into()).message_persisted());
        assert!(AppError::TopicProvisioning("denied".into()).message_persisted());
        assert!(!AppError::Persistence("db down".into()).message_persisted());
        assert!(!AppError::SenderUnknown(SessionId::new()).message_persisted());
    }
}
