//! # Upstream Session Client
//!
//! Owns the one WebSocket connection to the remote voice service for the
//! lifetime of a relay session. `open()` establishes the connection and
//! performs session negotiation — it sends `session.create` and waits for the
//! `session.created` acknowledgement before the client is ready. There is no
//! reconnect: when this connection dies, the relay session dies with it.
//!
//! ## Operation semantics:
//! - `open()` fails with a Transport error if the connection cannot be
//!   established and a Negotiation error if the acknowledgement never arrives
//! - `send_audio` / `commit` / `cancel` / `close` never fail: when the session
//!   is not ready (or already torn down) they degrade to silent no-ops, which
//!   keeps the relay simple under teardown races
//! - `commit` sends the end-of-input marker followed by a generate-response
//!   request, as two ordered messages
//!
//! Internally the connection is split into a writer task fed by a command
//! channel and a reader task that parses events into an event channel, so all
//! public operations are synchronous and non-blocking.

use crate::config::UpstreamConfig;
use crate::error::{RelayError, RelayResult};
use crate::protocol::{UpstreamEvent, UpstreamMessage};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Commands accepted by the writer task.
#[derive(Debug)]
enum UpstreamCommand {
    Audio(String),
    Commit,
    Cancel,
    Close,
}

/// Handle to one negotiated upstream voice session.
pub struct UpstreamSessionClient {
    commands: mpsc::UnboundedSender<UpstreamCommand>,
    ready: Arc<AtomicBool>,
}

impl UpstreamSessionClient {
    /// Connect to the upstream service and negotiate a session.
    ///
    /// Sends `session.create` with the configured model and the supplied
    /// system prompt, then waits for `session.created`. On success, returns
    /// the client handle plus the stream of post-negotiation events.
    pub async fn open(
        config: &UpstreamConfig,
        system_prompt: &str,
    ) -> RelayResult<(Self, mpsc::UnboundedReceiver<UpstreamEvent>)> {
        let endpoint = config.endpoint();
        let (mut ws, _) = connect_async(&endpoint).await.map_err(|e| {
            RelayError::Transport(format!("failed to connect to upstream: {}", e))
        })?;

        let create = UpstreamMessage::session_create(&config.model, system_prompt);
        let payload = serde_json::to_string(&create)
            .map_err(|e| RelayError::Internal(format!("failed to encode session.create: {}", e)))?;
        ws.send(Message::Text(payload)).await.map_err(|e| {
            RelayError::Transport(format!("failed to send session.create: {}", e))
        })?;

        // Negotiation: consume messages until the created-acknowledgement.
        loop {
            let msg = ws.next().await.ok_or_else(|| {
                RelayError::Negotiation("connection ended before session.created".to_string())
            })?;

            match msg {
                Ok(Message::Text(text)) => {
                    let value: serde_json::Value = match serde_json::from_str(&text) {
                        Ok(v) => v,
                        Err(e) => {
                            debug!(error = %e, "unparseable message during negotiation, skipping");
                            continue;
                        }
                    };
                    match value.get("type").and_then(|t| t.as_str()) {
                        Some("session.created") => {
                            info!("upstream session created");
                            break;
                        }
                        Some("error") => {
                            let detail = value
                                .get("error")
                                .and_then(|e| e.as_str())
                                .unwrap_or("unknown upstream error");
                            return Err(RelayError::Negotiation(format!(
                                "upstream rejected session.create: {}",
                                detail
                            )));
                        }
                        _ => continue,
                    }
                }
                Ok(Message::Close(_)) => {
                    return Err(RelayError::Negotiation(
                        "upstream closed during negotiation".to_string(),
                    ));
                }
                Ok(_) => continue,
                Err(e) => {
                    return Err(RelayError::Negotiation(format!(
                        "transport failure during negotiation: {}",
                        e
                    )));
                }
            }
        }

        let (mut sink, mut stream) = ws.split();
        let ready = Arc::new(AtomicBool::new(true));

        // Writer task: serializes commands onto the socket in order.
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<UpstreamCommand>();
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                let result = match cmd {
                    UpstreamCommand::Audio(data) => {
                        send_json(&mut sink, &UpstreamMessage::audio_append(data)).await
                    }
                    UpstreamCommand::Commit => {
                        // End-of-input then generate-response, in that order.
                        match send_json(&mut sink, &UpstreamMessage::AudioCommit).await {
                            Ok(()) => send_json(&mut sink, &UpstreamMessage::ResponseCreate).await,
                            Err(e) => Err(e),
                        }
                    }
                    UpstreamCommand::Cancel => {
                        send_json(&mut sink, &UpstreamMessage::ResponseCancel).await
                    }
                    UpstreamCommand::Close => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = result {
                    // Best-effort by contract: log and stop writing.
                    warn!(error = %e, "upstream write failed, dropping writer");
                    break;
                }
            }
        });

        // Reader task: parses events and forwards them to the relay.
        let (event_tx, event_rx) = mpsc::unbounded_channel::<UpstreamEvent>();
        let reader_ready = Arc::clone(&ready);
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<UpstreamEvent>(&text) {
                        Ok(event) => {
                            if event_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            // Unknown or malformed event: drop it, keep going.
                            debug!(error = %e, "ignoring unrecognized upstream message");
                        }
                    },
                    Ok(Message::Close(_)) => {
                        info!("upstream connection closed");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "upstream read failed");
                        break;
                    }
                }
            }
            reader_ready.store(false, Ordering::SeqCst);
            // Dropping event_tx ends the relay's event stream.
        });

        Ok((Self { commands: cmd_tx, ready }, event_rx))
    }

    /// Forward one transport-encoded audio chunk. No-op when not ready.
    pub fn send_audio(&self, data: String) {
        if !self.is_ready() {
            return;
        }
        let _ = self.commands.send(UpstreamCommand::Audio(data));
    }

    /// Signal end of the user utterance and request a response.
    /// No-op when not ready.
    pub fn commit(&self) {
        if !self.is_ready() {
            return;
        }
        let _ = self.commands.send(UpstreamCommand::Commit);
    }

    /// Best-effort cancel of the in-flight response. Never fails.
    pub fn cancel(&self) {
        if !self.is_ready() {
            return;
        }
        let _ = self.commands.send(UpstreamCommand::Cancel);
    }

    /// Close the upstream session. Idempotent.
    pub fn close(&self) {
        if self.ready.swap(false, Ordering::SeqCst) {
            let _ = self.commands.send(UpstreamCommand::Close);
        }
    }

    /// Whether the session is negotiated and the connection still alive.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    fn for_test() -> (Self, mpsc::UnboundedReceiver<UpstreamCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                commands: tx,
                ready: Arc::new(AtomicBool::new(true)),
            },
            rx,
        )
    }
}

async fn send_json<S>(sink: &mut S, msg: &UpstreamMessage) -> Result<(), RelayError>
where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let payload = serde_json::to_string(msg)
        .map_err(|e| RelayError::Internal(format!("failed to encode upstream message: {}", e)))?;
    sink.send(Message::Text(payload))
        .await
        .map_err(|e| RelayError::Transport(format!("upstream send failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_ordered_and_gated_on_ready() {
        let (client, mut rx) = UpstreamSessionClient::for_test();

        client.send_audio("AAAA".to_string());
        client.commit();
        client.cancel();

        assert!(matches!(rx.try_recv(), Ok(UpstreamCommand::Audio(data)) if data == "AAAA"));
        assert!(matches!(rx.try_recv(), Ok(UpstreamCommand::Commit)));
        assert!(matches!(rx.try_recv(), Ok(UpstreamCommand::Cancel)));

        // After close, everything degrades to a silent no-op.
        client.close();
        assert!(matches!(rx.try_recv(), Ok(UpstreamCommand::Close)));
        client.send_audio("BBBB".to_string());
        client.commit();
        client.cancel();
        client.close();
        assert!(rx.try_recv().is_err());
        assert!(!client.is_ready());
    }
}
