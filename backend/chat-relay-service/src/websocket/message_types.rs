use crate::error::{AppError, AppResult};
use crate::models::Message;
use crate::session::{PresenceEntry, SessionId};
use serde::{Deserialize, Serialize};

pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// Inbound WebSocket events from client to server
///
/// Frames look like `{"event": "submit-name", "data": "Alice"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    SubmitName(String),
    JoinPrivateRoom(SessionId),
    PrivateMessage(PrivateMessageRequest),
    Reconnect,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateMessageRequest {
    pub target_session_id: SessionId,
    pub body: String,
}

impl ClientEvent {
    /// Decode and validate a text frame.
    pub fn parse(text: &str) -> AppResult<Self> {
        let event: ClientEvent = serde_json::from_str(text)
            .map_err(|e| AppError::BadRequest(format!("malformed event: {e}")))?;

        match event {
            ClientEvent::SubmitName(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(AppError::BadRequest("display name cannot be empty".into()));
                }
                if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
                    return Err(AppError::BadRequest(format!(
                        "display name longer than {MAX_DISPLAY_NAME_CHARS} characters"
                    )));
                }
                Ok(ClientEvent::SubmitName(name.to_string()))
            }
            other => Ok(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SubmitName(_) => "submit-name",
            ClientEvent::JoinPrivateRoom(_) => "join-private-room",
            ClientEvent::PrivateMessage(_) => "private-message",
            ClientEvent::Reconnect => "reconnect",
            ClientEvent::Disconnect => "disconnect",
        }
    }
}

/// Outbound WebSocket events from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    AskForName,
    UpdateUserList(Vec<PresenceEntry>),
    RetrieveMessages(Vec<Message>),
    PrivateMessage(DeliveredMessage),
}

/// What a recipient sees of a relayed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredMessage {
    pub sender_id: SessionId,
    pub sender_name: String,
    pub body: String,
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
