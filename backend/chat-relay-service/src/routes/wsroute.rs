use crate::session::SessionId;
use crate::state::AppState;
use crate::websocket::handlers;
use crate::websocket::message_types::{ClientEvent, ServerEvent};
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Previous session id of a reconnecting client.
    pub session_id: Option<SessionId>,
}

// WebSocket Actor
struct WsSession {
    session_id: SessionId,
    state: AppState,
    // inbound events, drained in order by the session worker
    events: UnboundedSender<ClientEvent>,
    outbound: Option<UnboundedReceiver<ServerEvent>>,
    hb: Instant,
}

impl WsSession {
    fn new(
        session_id: SessionId,
        state: AppState,
        events: UnboundedSender<ClientEvent>,
        outbound: UnboundedReceiver<ServerEvent>,
    ) -> Self {
        Self {
            session_id,
            state,
            events,
            outbound: Some(outbound),
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(session_id = %act.session_id, "WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(session_id = %self.session_id, "WebSocket session started");

        self.hb(ctx);

        if let Some(outbound) = self.outbound.take() {
            ctx.add_stream(UnboundedReceiverStream::new(outbound));
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(session_id = %self.session_id, "WebSocket session stopped");

        let state = self.state.clone();
        let session_id = self.session_id;
        actix::spawn(async move {
            handlers::on_disconnect(&state, session_id).await;
        });
    }
}

// Forward outbound events to the socket
impl StreamHandler<ServerEvent> for WsSession {
    fn handle(&mut self, event: ServerEvent, ctx: &mut Self::Context) {
        match event.to_json() {
            Ok(text) => ctx.text(text),
            Err(e) => tracing::error!(error = %e, "Failed to serialize outbound event"),
        }
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match ClientEvent::parse(&text) {
                Ok(ClientEvent::Disconnect) => {
                    ctx.close(None);
                    ctx.stop();
                }
                Ok(event) => {
                    if self.events.send(event).is_err() {
                        tracing::warn!(session_id = %self.session_id, "Session worker gone, closing");
                        ctx.stop();
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id = %self.session_id, error = %e, "Failed to parse WS message");
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("WebSocket close message received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "WebSocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

// HTTP handler
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let state = state.get_ref().clone();
    let (session_id, outbound) = handlers::on_connect(&state, query.session_id).await;

    let (events_tx, events_rx) = unbounded_channel();
    tokio::spawn(handlers::run_session_worker(
        state.clone(),
        session_id,
        events_rx,
    ));

    let session = WsSession::new(session_id, state.clone(), events_tx, outbound);
    match ws::start(session, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            // handshake failed; the connection never opened
            handlers::on_disconnect(&state, session_id).await;
            Err(e)
        }
    }
}
