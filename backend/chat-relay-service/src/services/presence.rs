use crate::metrics::ChatMetrics;
use crate::session::SessionRegistry;
use crate::websocket::message_types::ServerEvent;

/// Sends the current user list to every open connection.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: SessionRegistry,
    metrics: ChatMetrics,
}

impl PresenceBroadcaster {
    pub fn new(registry: SessionRegistry, metrics: ChatMetrics) -> Self {
        Self { registry, metrics }
    }

    /// One `update-user-list` per open connection, named or not.
    ///
    /// Returns how many connections accepted the event.
    pub async fn broadcast(&self) -> usize {
        let users = self.registry.list().await;
        let connections = self.registry.connections().await;
        self.metrics.live_sessions.set(connections.len() as i64);

        let delivered = connections
            .iter()
            .filter(|(_, handle)| handle.emit(ServerEvent::UpdateUserList(users.clone())))
            .count();

        tracing::debug!(
            users = users.len(),
            connections = connections.len(),
            delivered,
            "Broadcast user list"
        );
        delivered
    }
}
