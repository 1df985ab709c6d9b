use crate::{
    broker::{BrokerPublisher, TopicStrategy},
    metrics::ChatMetrics,
    services::{MessageRouter, MessageStore, PresenceBroadcaster, ReplayService},
    session::SessionRegistry,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub router: Arc<MessageRouter>,
    pub replay: Arc<ReplayService>,
    pub presence: PresenceBroadcaster,
    pub metrics: ChatMetrics,
    /// Whether a client may reclaim an offline session id on connect.
    pub session_resume: bool,
}

impl AppState {
    /// Wire the core services around one fresh registry.
    pub fn new(
        store: Arc<dyn MessageStore>,
        publisher: Arc<dyn BrokerPublisher>,
        topics: TopicStrategy,
        metrics: ChatMetrics,
    ) -> Self {
        let registry = SessionRegistry::new();

        let router = Arc::new(MessageRouter::new(
            registry.clone(),
            store.clone(),
            publisher,
            topics,
            metrics.clone(),
        ));
        let replay = Arc::new(ReplayService::new(registry.clone(), store));
        let presence = PresenceBroadcaster::new(registry.clone(), metrics.clone());

        Self {
            registry,
            router,
            replay,
            presence,
            metrics,
            session_resume: false,
        }
    }

    pub fn with_session_resume(mut self, enabled: bool) -> Self {
        self.session_resume = enabled;
        self
    }
}
