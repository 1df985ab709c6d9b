use crate::error::{AppError, AppResult};
use crate::models::Message;
use crate::services::message_store::MessageStore;
use crate::session::{SessionId, SessionRegistry};
use crate::websocket::message_types::ServerEvent;
use std::sync::Arc;

/// Full-history replay for reconnecting sessions.
pub struct ReplayService {
    registry: SessionRegistry,
    store: Arc<dyn MessageStore>,
}

impl ReplayService {
    pub fn new(registry: SessionRegistry, store: Arc<dyn MessageStore>) -> Self {
        Self { registry, store }
    }

    /// Emit `retrieve-messages` with every message the session sent or
    /// received, oldest first, and return the same list.
    pub async fn replay(&self, session_id: SessionId) -> AppResult<Vec<Message>> {
        let handle = self
            .registry
            .connection(session_id)
            .await
            .ok_or(AppError::SessionNotConnected(session_id))?;

        let messages = self.store.history(session_id).await?;

        tracing::info!(
            session_id = %session_id,
            count = messages.len(),
            "Replaying message history"
        );

        if !handle.emit(ServerEvent::RetrieveMessages(messages.clone())) {
            tracing::debug!(session_id = %session_id, "Connection closed before replay");
        }
        Ok(messages)
    }
}
