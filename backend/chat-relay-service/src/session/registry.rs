use super::{SessionId, SessionState};
use crate::error::{AppError, AppResult};
use crate::websocket::message_types::ServerEvent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};

/// Outbound side of a connection.
///
/// Whatever drives the socket holds the receiver; dropping it makes every
/// later `emit` return `false`.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: UnboundedSender<ServerEvent>,
}

impl SessionHandle {
    pub fn channel() -> (Self, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { sender: tx }, rx)
    }

    pub fn emit(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Snapshot of a named session returned by [`SessionRegistry::lookup`].
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub display_name: String,
    pub state: SessionState,
    pub active_peer: Option<SessionId>,
    pub handle: SessionHandle,
}

/// One row of the `update-user-list` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub id: SessionId,
    pub name: String,
}

struct SessionEntry {
    handle: SessionHandle,
    display_name: Option<String>,
    state: SessionState,
    active_peer: Option<SessionId>,
    // connection order, keeps list() stable
    seq: u64,
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<SessionId, SessionEntry>,
    next_seq: u64,
}

/// Live sessions of this instance.
///
/// The only owner of session state: every mutation goes through the write
/// lock, so concurrent handlers observe connect/name/disconnect in a single
/// order. An id is present exactly while its connection is open.
#[derive(Default, Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a freshly opened connection in `Connecting` state.
    ///
    /// Returns `false` without touching anything if the id is already live.
    pub async fn connect(&self, id: SessionId, handle: SessionHandle) -> bool {
        let mut guard = self.inner.write().await;
        if guard.sessions.contains_key(&id) {
            return false;
        }

        let seq = guard.next_seq;
        guard.next_seq += 1;
        guard.sessions.insert(
            id,
            SessionEntry {
                handle,
                display_name: None,
                state: SessionState::Connecting,
                active_peer: None,
                seq,
            },
        );

        tracing::debug!(
            session_id = %id,
            live_connections = guard.sessions.len(),
            "Attached connection"
        );
        true
    }

    /// Set or overwrite the display name of a live session.
    ///
    /// Re-registering the same id only replaces the name; it never adds an
    /// entry.
    pub async fn register(&self, id: SessionId, name: impl Into<String>) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        let entry = guard
            .sessions
            .get_mut(&id)
            .ok_or(AppError::SessionNotConnected(id))?;

        entry.state = entry.state.on_submit_name()?;
        entry.display_name = Some(name.into());

        tracing::debug!(session_id = %id, state = ?entry.state, "Registered display name");
        Ok(())
    }

    /// Record the peer a named session opened a private room with.
    pub async fn join_room(&self, id: SessionId, target: SessionId) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        let entry = guard
            .sessions
            .get_mut(&id)
            .ok_or(AppError::SessionNotConnected(id))?;

        entry.state = entry.state.on_join_room()?;
        entry.active_peer = Some(target);
        Ok(())
    }

    /// Remove a session. Absent ids are a no-op and return `false`.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut guard = self.inner.write().await;
        match guard.sessions.remove(&id) {
            Some(entry) => {
                tracing::debug!(
                    session_id = %id,
                    final_state = ?entry.state.on_disconnect(),
                    remaining = guard.sessions.len(),
                    "Removed session"
                );
                true
            }
            None => false,
        }
    }

    /// Named session for `id`, if any. Connections that have not submitted a
    /// name yet are not returned.
    pub async fn lookup(&self, id: SessionId) -> Option<Session> {
        let guard = self.inner.read().await;
        let entry = guard.sessions.get(&id)?;
        if !entry.state.is_named() {
            return None;
        }
        let display_name = entry.display_name.clone()?;

        Some(Session {
            id,
            display_name,
            state: entry.state,
            active_peer: entry.active_peer,
            handle: entry.handle.clone(),
        })
    }

    /// Named sessions in connection order.
    pub async fn list(&self) -> Vec<PresenceEntry> {
        let guard = self.inner.read().await;
        let mut named: Vec<(u64, PresenceEntry)> = guard
            .sessions
            .iter()
            .filter_map(|(id, entry)| {
                entry.display_name.as_ref().map(|name| {
                    (
                        entry.seq,
                        PresenceEntry {
                            id: *id,
                            name: name.clone(),
                        },
                    )
                })
            })
            .collect();
        named.sort_by_key(|(seq, _)| *seq);
        named.into_iter().map(|(_, entry)| entry).collect()
    }

    /// Transport handle of a live connection, named or not.
    pub async fn connection(&self, id: SessionId) -> Option<SessionHandle> {
        let guard = self.inner.read().await;
        guard.sessions.get(&id).map(|entry| entry.handle.clone())
    }

    /// Handles of every live connection.
    pub async fn connections(&self) -> Vec<(SessionId, SessionHandle)> {
        let guard = self.inner.read().await;
        guard
            .sessions
            .iter()
            .map(|(id, entry)| (*id, entry.handle.clone()))
            .collect()
    }

    pub async fn is_connected(&self, id: SessionId) -> bool {
        self.inner.read().await.sessions.contains_key(&id)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected(registry: &SessionRegistry) -> (SessionId, UnboundedReceiver<ServerEvent>) {
        let id = SessionId::new();
        let (handle, rx) = SessionHandle::channel();
        assert!(registry.connect(id, handle).await);
        (id, rx)
    }

    #[tokio::test]
    async fn lookup_follows_name_submission_and_disconnect() {
        let registry = SessionRegistry::new();
        let (id, _id_rx) = connected(&registry).await;

        assert!(registry.lookup(id).await.is_none(), "unnamed session must not resolve");

        registry.register(id, "Alice").await.unwrap();
        let session = registry.lookup(id).await.expect("named session");
        assert_eq!(session.display_name, "Alice");
        assert_eq!(session.state, SessionState::Named);

        assert!(registry.unregister(id).await);
        assert!(registry.lookup(id).await.is_none());
        assert!(!registry.is_connected(id).await);
    }

    #[tokio::test]
    async fn resubmitting_a_name_overwrites_in_place() {
        let registry = SessionRegistry::new();
        let (id, _id_rx) = connected(&registry).await;

        registry.register(id, "Alice").await.unwrap();
        let before = registry.list().await.len();
        registry.register(id, "Alicia").await.unwrap();
        registry.register(id, "Alicia").await.unwrap();

        let list = registry.list().await;
        assert_eq!(list.len(), before);
        assert_eq!(list[0].name, "Alicia");
    }

    #[tokio::test]
    async fn register_without_connection_fails() {
        let registry = SessionRegistry::new();
        let ghost = SessionId::new();

        let err = registry.register(ghost, "Ghost").await.unwrap_err();
        assert!(matches!(err, AppError::SessionNotConnected(id) if id == ghost));
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn unregister_absent_is_noop() {
        let registry = SessionRegistry::new();
        assert!(!registry.unregister(SessionId::new()).await);
    }

    #[tokio::test]
    async fn duplicate_connect_is_rejected() {
        let registry = SessionRegistry::new();
        let (id, _id_rx) = connected(&registry).await;
        let (handle, _rx) = SessionHandle::channel();
        assert!(!registry.connect(id, handle).await);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn list_is_in_connection_order_and_skips_unnamed() {
        let registry = SessionRegistry::new();
        let (first, _first_rx) = connected(&registry).await;
        let (unnamed, _unnamed_rx) = connected(&registry).await;
        let (third, _third_rx) = connected(&registry).await;

        registry.register(third, "Carol").await.unwrap();
        registry.register(first, "Alice").await.unwrap();

        let list = registry.list().await;
        assert_eq!(
            list,
            vec![
                PresenceEntry {
                    id: first,
                    name: "Alice".into()
                },
                PresenceEntry {
                    id: third,
                    name: "Carol".into()
                },
            ]
        );
        assert!(registry.connection(unnamed).await.is_some());
        assert_eq!(registry.connections().await.len(), 3);
    }

    #[tokio::test]
    async fn join_room_activates_named_sessions_only() {
        let registry = SessionRegistry::new();
        let (id, _id_rx) = connected(&registry).await;
        let peer = SessionId::new();

        assert!(matches!(
            registry.join_room(id, peer).await,
            Err(AppError::InvalidTransition { .. })
        ));

        registry.register(id, "Alice").await.unwrap();
        registry.join_room(id, peer).await.unwrap();

        let session = registry.lookup(id).await.unwrap();
        assert_eq!(session.state, SessionState::Active);
        assert_eq!(session.active_peer, Some(peer));
    }
}
