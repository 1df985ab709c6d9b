//! Shared fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chat_relay_service::{
    broker::{BrokerPublisher, PublishTarget, TopicStrategy},
    error::{AppError, AppResult},
    metrics::ChatMetrics,
    models::{Message, PrivateMessageEvent},
    services::MessageStore,
    session::SessionId,
    state::AppState,
    websocket::{handlers, ServerEvent},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::RwLock;

/// In-memory message store with a switchable failure mode.
#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<Vec<Message>>,
    fail: AtomicBool,
}

impl InMemoryMessageStore {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn writes(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn all(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: &Message) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("database unavailable".into()));
        }
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn history(&self, session: SessionId) -> AppResult<Vec<Message>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("database unavailable".into()));
        }
        let mut matching: Vec<Message> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.involves(session))
            .cloned()
            .collect();
        matching.sort_by_key(|m| m.timestamp);
        Ok(matching)
    }
}

/// Publisher that records every successful publish.
#[derive(Default)]
pub struct RecordingPublisher {
    published: RwLock<Vec<(PublishTarget, PrivateMessageEvent)>>,
    failure: Mutex<Option<AppError>>,
}

impl RecordingPublisher {
    pub fn set_failing(&self, fail: bool) {
        let failure = fail.then(|| AppError::Publish("broker unreachable".into()));
        *self.failure.lock().unwrap() = failure;
    }

    /// Fail every publish with `err`.
    pub fn fail_with(&self, err: AppError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub async fn published(&self) -> Vec<(PublishTarget, PrivateMessageEvent)> {
        self.published.read().await.clone()
    }
}

#[async_trait]
impl BrokerPublisher for RecordingPublisher {
    async fn publish(&self, target: &PublishTarget, event: &PrivateMessageEvent) -> AppResult<()> {
        let failure = self.failure.lock().unwrap().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.published
            .write()
            .await
            .push((target.clone(), event.clone()));
        Ok(())
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<InMemoryMessageStore>,
    pub publisher: Arc<RecordingPublisher>,
}

pub fn harness() -> Harness {
    harness_with(TopicStrategy::shared("chat.private-messages"))
}

pub fn harness_with(topics: TopicStrategy) -> Harness {
    let store = Arc::new(InMemoryMessageStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let state = AppState::new(
        store.clone(),
        publisher.clone(),
        topics,
        ChatMetrics::new(),
    );
    Harness {
        state,
        store,
        publisher,
    }
}

/// A connected client: its id plus everything the server sent it.
pub struct Client {
    pub id: SessionId,
    pub inbox: UnboundedReceiver<ServerEvent>,
}

impl Client {
    /// Drain everything received so far.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.inbox.try_recv() {
            events.push(event);
        }
        events
    }
}

pub async fn connect(state: &AppState) -> Client {
    let (id, inbox) = handlers::on_connect(state, None).await;
    Client { id, inbox }
}

/// Connect and submit a display name, then discard the greeting traffic.
pub async fn connect_named(state: &AppState, name: &str) -> Client {
    let mut client = connect(state).await;
    state
        .registry
        .register(client.id, name)
        .await
        .expect("register");
    state.presence.broadcast().await;
    client.drain();
    client
}

pub fn user_lists(events: &[ServerEvent]) -> Vec<Vec<SessionId>> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::UpdateUserList(users) => Some(users.iter().map(|u| u.id).collect()),
            _ => None,
        })
        .collect()
}
