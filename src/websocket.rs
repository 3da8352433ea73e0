//! # WebSocket Relay Handler
//!
//! One actor per local client connection. Clients connect to `/ws`, send
//! JSON control messages and base64 audio chunks, and receive synthesized
//! audio plus lifecycle events back on the same socket.
//!
//! ## Actor Model:
//! The actix actor mailbox is what makes the relay a single logical
//! sequential actor: client messages (via the WebSocket stream) and upstream
//! events (via `do_send` from the pump task) are interleaved into one queue
//! and each is handled as a discrete, non-preemptible step against the
//! [`SessionRelay`] state machine. Separate connections are fully
//! independent actors with no shared mutable state.
//!
//! ## Connection lifecycle:
//! 1. HTTP upgrade (refused with 503 when the session limit is reached)
//! 2. The actor spawns the upstream `open()`; negotiation failure is fatal —
//!    the client gets an `error` event and the connection closes
//! 3. Steady state: relay effects are applied in order, upstream first
//! 4. Local close tears the upstream session down with it

use crate::error::RelayError;
use crate::protocol::{ClientMessage, ServerMessage, UpstreamEvent};
use crate::relay::{RelayEffect, SessionRelay};
use crate::state::AppState;
use crate::upstream::UpstreamSessionClient;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How often the server pings the client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long without any client traffic before the connection is dropped.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// WebSocket actor for one relay session.
pub struct RelaySocket {
    /// Unique id for this session, for logging and metrics
    session_id: String,

    app_state: web::Data<AppState>,

    /// The per-connection state machine
    relay: SessionRelay,

    /// Upstream session handle, present once negotiation completed
    upstream: Option<UpstreamSessionClient>,

    last_heartbeat: Instant,
}

impl RelaySocket {
    pub fn new(app_state: web::Data<AppState>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            app_state,
            relay: SessionRelay::new(),
            upstream: None,
            last_heartbeat: Instant::now(),
        }
    }

    /// Carry out relay effects in the order the state machine produced them.
    fn apply_effects(&mut self, effects: Vec<RelayEffect>, ctx: &mut ws::WebsocketContext<Self>) {
        for effect in effects {
            match effect {
                RelayEffect::ForwardAudio(data) => {
                    if let Some(upstream) = &self.upstream {
                        upstream.send_audio(data);
                        self.app_state.record_chunk_forwarded();
                    } else {
                        // Not negotiated yet: degrade silently by contract.
                        debug!(session_id = %self.session_id, "dropping chunk, upstream not ready");
                    }
                }
                RelayEffect::CommitUpstream => {
                    if let Some(upstream) = &self.upstream {
                        upstream.commit();
                    }
                }
                RelayEffect::CancelUpstream => {
                    if let Some(upstream) = &self.upstream {
                        upstream.cancel();
                    }
                }
                RelayEffect::CloseUpstream => {
                    if let Some(upstream) = &self.upstream {
                        upstream.close();
                    }
                }
                RelayEffect::Send(msg) => {
                    match &msg {
                        ServerMessage::ResponseCompleted => {
                            self.app_state.record_response_completed()
                        }
                        ServerMessage::ResponseInterrupted => {
                            self.app_state.record_response_interrupted()
                        }
                        _ => {}
                    }
                    self.send_downstream(&msg, ctx);
                }
            }
        }
    }

    fn send_downstream(&self, msg: &ServerMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::to_string(msg) {
            Ok(text) => ctx.text(text),
            Err(e) => error!(session_id = %self.session_id, error = %e, "failed to encode downstream message"),
        }
    }

    fn send_error(&self, error: &RelayError, ctx: &mut ws::WebsocketContext<Self>) {
        self.send_downstream(
            &ServerMessage::Error {
                error: error.to_string(),
            },
            ctx,
        );
    }
}

/// The upstream session finished negotiating.
#[derive(Message)]
#[rtype(result = "()")]
struct UpstreamOpened {
    client: UpstreamSessionClient,
}

/// One event arrived from the upstream session.
#[derive(Message)]
#[rtype(result = "()")]
struct FromUpstream(UpstreamEvent);

/// The upstream session failed to open or its connection ended.
#[derive(Message)]
#[rtype(result = "()")]
struct UpstreamGone {
    error: RelayError,
}

impl Actor for RelaySocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(session_id = %self.session_id, "relay session connected");
        self.app_state.session_opened();

        // Heartbeat: ping on an interval, drop unresponsive clients.
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(session_id = %act.session_id, "client heartbeat timeout, closing");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });

        // Open the upstream session off the actor thread; results and events
        // come back through the mailbox.
        let upstream_config = self.app_state.get_config().upstream;
        let system_prompt = self.app_state.system_prompt.clone();
        let addr = ctx.address();
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            match UpstreamSessionClient::open(&upstream_config, &system_prompt).await {
                Ok((client, mut events)) => {
                    addr.do_send(UpstreamOpened { client });
                    while let Some(event) = events.recv().await {
                        addr.do_send(FromUpstream(event));
                    }
                    // The event stream ending means the upstream connection
                    // is gone; harmless if the actor already stopped.
                    addr.do_send(UpstreamGone {
                        error: RelayError::Transport("upstream connection closed".to_string()),
                    });
                }
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "upstream session failed to open");
                    addr.do_send(UpstreamGone { error: e });
                }
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(session_id = %self.session_id, state = self.relay.state().as_str(), "relay session disconnected");
        // Make sure the upstream side is torn down with the local side.
        for effect in self.relay.connection_closed() {
            if let RelayEffect::CloseUpstream = effect {
                if let Some(upstream) = &self.upstream {
                    upstream.close();
                }
            }
        }
        self.app_state.session_closed();
    }
}

impl Handler<UpstreamOpened> for RelaySocket {
    type Result = ();

    fn handle(&mut self, msg: UpstreamOpened, _ctx: &mut Self::Context) {
        debug!(session_id = %self.session_id, "upstream session ready");
        self.upstream = Some(msg.client);
        self.relay.upstream_ready();
    }
}

impl Handler<FromUpstream> for RelaySocket {
    type Result = ();

    fn handle(&mut self, msg: FromUpstream, ctx: &mut Self::Context) {
        let effects = self.relay.on_upstream_event(msg.0);
        self.apply_effects(effects, ctx);
    }
}

impl Handler<UpstreamGone> for RelaySocket {
    type Result = ();

    fn handle(&mut self, msg: UpstreamGone, ctx: &mut Self::Context) {
        // Fatal for this relay instance: surface the error, close the local
        // connection, no automatic retry.
        self.send_error(&msg.error, ctx);
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelaySocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    let effects = self.relay.on_client_message(client_msg);
                    self.apply_effects(effects, ctx);
                }
                Err(e) => {
                    // Malformed message: drop it, tell the client, continue.
                    let err = RelayError::Protocol(format!("invalid client message: {}", e));
                    warn!(session_id = %self.session_id, "{}", err);
                    self.send_error(&err, ctx);
                }
            },
            Ok(ws::Message::Binary(_)) => {
                let err =
                    RelayError::Protocol("binary frames are not part of the protocol".to_string());
                warn!(session_id = %self.session_id, "{}", err);
                self.send_error(&err, ctx);
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(session_id = %self.session_id, reason = ?reason, "client closed connection");
                let effects = self.relay.connection_closed();
                self.apply_effects(effects, ctx);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                error!(session_id = %self.session_id, error = %e, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// HTTP → WebSocket upgrade handler for `/ws`.
///
/// Refuses new sessions with 503 when the configured concurrency limit is
/// already reached; otherwise starts one [`RelaySocket`] actor for the
/// connection.
pub async fn relay_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let metrics = app_state.get_metrics_snapshot();
    let limit = app_state.get_config().performance.max_concurrent_sessions;
    if metrics.active_sessions as usize >= limit {
        warn!(
            active = metrics.active_sessions,
            limit, "refusing relay session, limit reached"
        );
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "error": {
                "type": "session_limit",
                "message": format!("Maximum concurrent sessions ({}) reached", limit),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        })));
    }

    info!(peer = ?req.connection_info().peer_addr(), "new relay connection request");
    ws::start(RelaySocket::new(app_state), &req, stream)
}
