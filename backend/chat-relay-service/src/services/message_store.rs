//! # Message Store
//!
//! Append/query contract for private message records. The PostgreSQL
//! implementation keeps every message forever; nothing here updates or
//! deletes rows.

use crate::error::{AppError, AppResult};
use crate::models::Message;
use crate::session::SessionId;
use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably append one message.
    async fn append(&self, message: &Message) -> AppResult<()>;

    /// Every message `session` sent or received, oldest first.
    async fn history(&self, session: SessionId) -> AppResult<Vec<Message>>;
}

pub struct PgMessageStore {
    db: Pool,
}

impl PgMessageStore {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

fn parse_session(row: &Row, column: &str) -> AppResult<SessionId> {
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e| AppError::Persistence(format!("stored {column} '{raw}' is not a session id: {e}")))
}

fn row_to_message(row: &Row) -> AppResult<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        sender_id: parse_session(row, "sender_id")?,
        receiver_id: parse_session(row, "receiver_id")?,
        sender_name: row.try_get("sender_name")?,
        body: row.try_get("body")?,
        timestamp: row.try_get("timestamp")?,
    })
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, message: &Message) -> AppResult<()> {
        let client = self.db.get().await?;

        client
            .execute(
                r#"
                INSERT INTO messages (id, sender_id, receiver_id, sender_name, body, timestamp)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
                &[
                    &message.id,
                    &message.sender_id.to_string(),
                    &message.receiver_id.to_string(),
                    &message.sender_name,
                    &message.body,
                    &message.timestamp,
                ],
            )
            .await?;

        tracing::debug!(
            message_id = %message.id,
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            "Message persisted"
        );
        Ok(())
    }

    async fn history(&self, session: SessionId) -> AppResult<Vec<Message>> {
        let client = self.db.get().await?;
        let session = session.to_string();

        let rows = client
            .query(
                r#"
                SELECT id, sender_id, receiver_id, sender_name, body, timestamp
                FROM messages
                WHERE sender_id = $1 OR receiver_id = $1
                ORDER BY timestamp ASC, id ASC
                "#,
                &[&session],
            )
            .await?;

        rows.iter().map(row_to_message).collect()
    }
}
