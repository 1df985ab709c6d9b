use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Private message record matching the `messages` table.
///
/// Immutable once persisted; the service never updates or deletes rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: SessionId,
    pub receiver_id: SessionId,
    pub sender_name: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a new message stamped with the current time.
    pub fn new(
        sender_id: SessionId,
        receiver_id: SessionId,
        sender_name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            sender_name: sender_name.into(),
            body: body.into(),
            timestamp: Utc::now(),
        }
    }

    /// Whether `session` took part in this message as sender or receiver.
    pub fn involves(&self, session: SessionId) -> bool {
        self.sender_id == session || self.receiver_id == session
    }
}

/// Broker payload for one private message.
///
/// Carries the full record plus the sender identity so a consumer on any
/// instance can deliver it without touching the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateMessageEvent {
    pub message_id: Uuid,
    pub sender_id: SessionId,
    pub sender_name: String,
    pub receiver_id: SessionId,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for PrivateMessageEvent {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.id,
            sender_id: message.sender_id,
            sender_name: message.sender_name.clone(),
            receiver_id: message.receiver_id,
            body: message.body.clone(),
            timestamp: message.timestamp,
        }
    }
}

impl PrivateMessageEvent {
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_uses_camel_case_record_shape() {
        let message = Message::new(SessionId::new(), SessionId::new(), "Alice", "hi");
        let json = serde_json::to_value(&message).unwrap();

        for field in ["id", "senderId", "receiverId", "senderName", "body", "timestamp"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["senderName"], "Alice");
        assert_eq!(json["senderId"], message.sender_id.to_string());
    }

    #[test]
    fn involves_matches_either_side() {
        let alice = SessionId::new();
        let bob = SessionId::new();
        let message = Message::new(alice, bob, "Alice", "hi");

        assert!(message.involves(alice));
        assert!(message.involves(bob));
        assert!(!message.involves(SessionId::new()));
    }

    #[test]
    fn event_carries_sender_identity() {
        let message = Message::new(SessionId::new(), SessionId::new(), "Alice", "hello");
        let event = PrivateMessageEvent::from(&message);
        let parsed = PrivateMessageEvent::from_json(event.to_json().unwrap().as_bytes()).unwrap();

        assert_eq!(parsed.message_id, message.id);
        assert_eq!(parsed.sender_name, "Alice");
        assert_eq!(parsed.receiver_id, message.receiver_id);
    }

    #[test]
    fn event_rejects_missing_receiver() {
        let payload = serde_json::json!({
            "messageId": Uuid::new_v4(),
            "senderId": SessionId::new(),
            "senderName": "Alice",
            "body": "hi",
            "timestamp": Utc::now(),
        });
        assert!(PrivateMessageEvent::from_json(payload.to_string().as_bytes()).is_err());
    }
}
