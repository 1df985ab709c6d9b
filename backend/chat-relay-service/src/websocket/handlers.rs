//! Transport-independent handling of connection lifecycle and inbound events.
//!
//! Each inbound event is one unit of work. Errors stop at this boundary: they
//! are logged and never sent back to the client.

use crate::error::{AppError, AppResult};
use crate::session::{SessionHandle, SessionId};
use crate::state::AppState;
use crate::websocket::message_types::{ClientEvent, ServerEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

/// Attach a new connection and greet it.
///
/// When session resume is enabled, `resume` lets a reconnecting client keep
/// its previous session id (and with it, its history) as long as no live
/// connection holds that id. Otherwise it is ignored.
pub async fn on_connect(
    state: &AppState,
    resume: Option<SessionId>,
) -> (SessionId, UnboundedReceiver<ServerEvent>) {
    let (handle, rx) = SessionHandle::channel();
    let resume = resume.filter(|_| state.session_resume);

    let mut session_id = resume.unwrap_or_default();
    while !state.registry.connect(session_id, handle.clone()).await {
        warn!(session_id = %session_id, "Session id already live, assigning a new one");
        session_id = SessionId::new();
    }

    info!(session_id = %session_id, resumed = resume == Some(session_id), "A user connected");

    handle.emit(ServerEvent::AskForName);
    handle.emit(ServerEvent::UpdateUserList(state.registry.list().await));
    state
        .metrics
        .live_sessions
        .set(state.registry.connection_count().await as i64);

    (session_id, rx)
}

/// Remove the session and tell everyone else. Returns `false` if it was
/// already gone, in which case nothing is broadcast.
pub async fn on_disconnect(state: &AppState, session_id: SessionId) -> bool {
    if !state.registry.unregister(session_id).await {
        return false;
    }

    info!(session_id = %session_id, "User disconnected");
    state.presence.broadcast().await;
    true
}

pub async fn handle_client_event(
    state: &AppState,
    session_id: SessionId,
    event: ClientEvent,
) -> AppResult<()> {
    match event {
        ClientEvent::SubmitName(name) => {
            state.registry.register(session_id, name).await?;
            state.presence.broadcast().await;
        }

        ClientEvent::JoinPrivateRoom(target) => {
            state.registry.join_room(session_id, target).await?;
            debug!(session_id = %session_id, target = %target, "Joined private room");
        }

        ClientEvent::PrivateMessage(request) => {
            state
                .router
                .route(session_id, request.target_session_id, request.body)
                .await?;
        }

        ClientEvent::Reconnect => {
            info!(session_id = %session_id, "User reconnected");
            let handle = state
                .registry
                .connection(session_id)
                .await
                .ok_or(AppError::SessionNotConnected(session_id))?;
            handle.emit(ServerEvent::AskForName);
            state.replay.replay(session_id).await?;
        }

        ClientEvent::Disconnect => {
            on_disconnect(state, session_id).await;
        }
    }

    Ok(())
}

/// Process one connection's inbound events strictly in arrival order.
///
/// Events still queued when the session disconnects are discarded.
pub async fn run_session_worker(
    state: AppState,
    session_id: SessionId,
    mut events: UnboundedReceiver<ClientEvent>,
) {
    while let Some(event) = events.recv().await {
        if !state.registry.is_connected(session_id).await {
            debug!(session_id = %session_id, "Session gone, discarding queued events");
            break;
        }

        let name = event.name();
        if let Err(e) = handle_client_event(&state, session_id, event).await {
            log_event_error(session_id, name, &e);
        }
    }
}

fn log_event_error(session_id: SessionId, event: &str, e: &AppError) {
    match e {
        AppError::SenderUnknown(_)
        | AppError::SessionNotConnected(_)
        | AppError::InvalidTransition { .. }
        | AppError::BadRequest(_) => {
            warn!(session_id = %session_id, event, error = %e, "Rejected client event");
        }
        _ => {
            error!(
                session_id = %session_id,
                event,
                error = %e,
                persisted = e.message_persisted(),
                "Failed to handle client event"
            );
        }
    }
}
