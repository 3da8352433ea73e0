//! # Session Relay
//!
//! Per-connection state machine bridging the local client protocol to the
//! upstream voice session. The relay itself is pure and synchronous: each
//! inbound client message or upstream event is handled as one discrete,
//! non-preemptible step that returns an ordered list of [`RelayEffect`]s for
//! the connection actor to carry out. That keeps the interruption logic
//! testable without any transport and gives the single-sequential-actor
//! execution model for free.
//!
//! ## State machine:
//! ```text
//! Connecting -> Ready          upstream session negotiation completes
//! Ready      <-> Listening     first audio chunk / commit
//! Listening  -> Processing     client commits the utterance
//! Processing -> Speaking       first upstream audio delta
//! Speaking   -> Ready          upstream completion (playback drains naturally)
//! Speaking/Processing -> Interrupted   client barge-in
//! any        -> Closed         connection closes
//! ```
//!
//! ## Interruption correctness:
//! Every commit starts a new turn with a monotonically incremented turn id.
//! An interrupt deactivates the turn before anything else, so audio deltas or
//! completion events that race in after the cancel was sent upstream are
//! compared against the (now inactive) turn and dropped. Event ordering from
//! the network is never trusted.

use crate::protocol::{ClientMessage, ServerMessage, UpstreamEvent};
use tracing::{debug, info, warn};

/// Lifecycle state of one relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Upstream session negotiation in progress
    Connecting,
    /// Idle, ready for a new utterance
    Ready,
    /// Receiving capture audio from the client
    Listening,
    /// Utterance committed, awaiting the first response audio
    Processing,
    /// Relaying response audio downstream
    Speaking,
    /// Current turn cancelled by the user; re-enterable as Listening
    Interrupted,
    /// Connection torn down
    Closed,
}

impl RelayState {
    /// State name for logging and status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::Connecting => "connecting",
            RelayState::Ready => "ready",
            RelayState::Listening => "listening",
            RelayState::Processing => "processing",
            RelayState::Speaking => "speaking",
            RelayState::Interrupted => "interrupted",
            RelayState::Closed => "closed",
        }
    }
}

/// One side effect the connection actor must perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEffect {
    /// Forward one transport chunk to the upstream session
    ForwardAudio(String),
    /// Send the end-of-input + generate-response pair upstream
    CommitUpstream,
    /// Send a best-effort cancel upstream
    CancelUpstream,
    /// Close the upstream session
    CloseUpstream,
    /// Emit a message to the local client
    Send(ServerMessage),
}

/// The per-connection relay state machine.
pub struct SessionRelay {
    state: RelayState,
    /// Monotonically incrementing turn id; incremented on every commit
    turn: u64,
    /// Turn id of the response currently being generated/spoken, if any.
    /// `None` means any arriving response events are stale and dropped.
    active_turn: Option<u64>,
}

impl Default for SessionRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRelay {
    pub fn new() -> Self {
        Self {
            state: RelayState::Connecting,
            turn: 0,
            active_turn: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Turn id of the most recent commit.
    pub fn current_turn(&self) -> u64 {
        self.turn
    }

    /// Upstream session negotiation completed; the relay is ready for audio.
    pub fn upstream_ready(&mut self) {
        if self.state == RelayState::Connecting {
            info!("upstream session ready");
            self.state = RelayState::Ready;
        }
    }

    /// Handle one message from the local client.
    pub fn on_client_message(&mut self, msg: ClientMessage) -> Vec<RelayEffect> {
        if self.state == RelayState::Closed {
            debug!("client message after close ignored");
            return Vec::new();
        }

        match msg {
            ClientMessage::AudioChunk { data } => {
                // The first chunk of a new utterance moves the relay into
                // Listening; the chunk itself is always forwarded (the
                // upstream client no-ops while not ready).
                if matches!(self.state, RelayState::Ready | RelayState::Interrupted) {
                    debug!("capture started, entering listening state");
                    self.state = RelayState::Listening;
                }
                vec![RelayEffect::ForwardAudio(data)]
            }

            ClientMessage::Commit => {
                if self.state != RelayState::Listening {
                    debug!(state = self.state.as_str(), "commit outside listening ignored");
                    return Vec::new();
                }
                self.turn += 1;
                self.active_turn = Some(self.turn);
                self.state = RelayState::Processing;
                info!(turn = self.turn, "utterance committed");
                vec![RelayEffect::CommitUpstream]
            }

            ClientMessage::Interrupt => self.interrupt(),
        }
    }

    /// Handle one event from the upstream session.
    pub fn on_upstream_event(&mut self, event: UpstreamEvent) -> Vec<RelayEffect> {
        if self.state == RelayState::Closed {
            return Vec::new();
        }

        match event {
            UpstreamEvent::AudioDelta { audio } => {
                if self.active_turn.is_none() {
                    // Raced in after a cancel; must never reach playback.
                    debug!(turn = self.turn, "stale audio delta dropped");
                    return Vec::new();
                }
                if self.state == RelayState::Processing {
                    info!(turn = self.turn, "first audio delta, speaking");
                    self.state = RelayState::Speaking;
                }
                vec![RelayEffect::Send(ServerMessage::AudioOut {
                    data: audio.data,
                    sample_rate: audio.sample_rate_hz,
                })]
            }

            UpstreamEvent::Completed => {
                if self.active_turn.take().is_none() {
                    debug!(turn = self.turn, "completion for cancelled turn ignored");
                    return Vec::new();
                }
                info!(turn = self.turn, "response completed");
                self.state = RelayState::Ready;
                vec![RelayEffect::Send(ServerMessage::ResponseCompleted)]
            }

            UpstreamEvent::Interrupted => {
                // Upstream-initiated interruption. After a local barge-in the
                // turn is already inactive and this is a harmless ack.
                if self.active_turn.take().is_none() {
                    debug!(turn = self.turn, "interruption ack for cancelled turn ignored");
                    return Vec::new();
                }
                info!(turn = self.turn, "upstream interrupted response");
                self.state = RelayState::Interrupted;
                vec![RelayEffect::Send(ServerMessage::ResponseInterrupted)]
            }

            UpstreamEvent::Error { error } => {
                // Isolate-and-continue: surface the error, keep the session.
                warn!(error = %error, "upstream error event");
                vec![RelayEffect::Send(ServerMessage::Error { error })]
            }
        }
    }

    /// The local connection closed; tear down the upstream session.
    pub fn connection_closed(&mut self) -> Vec<RelayEffect> {
        if self.state == RelayState::Closed {
            return Vec::new();
        }
        info!("relay closing");
        self.state = RelayState::Closed;
        self.active_turn = None;
        vec![RelayEffect::CloseUpstream]
    }

    /// User barge-in. Side effects are strictly ordered: the local turn is
    /// deactivated first (so racing completion/delta events become stale),
    /// then cancel goes upstream, then the client is told to flush playback
    /// via `response_interrupted`.
    fn interrupt(&mut self) -> Vec<RelayEffect> {
        let was_active = self.active_turn.take().is_some()
            && matches!(self.state, RelayState::Processing | RelayState::Speaking);

        if !was_active {
            // Harmless no-op except for the cancel, which is idempotent on
            // the upstream side.
            debug!(state = self.state.as_str(), "interrupt while not speaking");
            return vec![RelayEffect::CancelUpstream];
        }

        info!(turn = self.turn, "user interrupted response");
        self.state = RelayState::Interrupted;
        vec![
            RelayEffect::CancelUpstream,
            RelayEffect::Send(ServerMessage::ResponseInterrupted),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::AudioDeltaPayload;

    fn delta(data: &str) -> UpstreamEvent {
        UpstreamEvent::AudioDelta {
            audio: AudioDeltaPayload {
                data: data.to_string(),
                sample_rate_hz: Some(24000),
            },
        }
    }

    fn ready_relay() -> SessionRelay {
        let mut relay = SessionRelay::new();
        relay.upstream_ready();
        relay
    }

    #[test]
    fn test_negotiation_transitions_connecting_to_ready() {
        let mut relay = SessionRelay::new();
        assert_eq!(relay.state(), RelayState::Connecting);
        relay.upstream_ready();
        assert_eq!(relay.state(), RelayState::Ready);
    }

    #[test]
    fn test_full_turn_with_barge_in() {
        let mut relay = ready_relay();

        // Ready -> Listening on the first audio chunk.
        let effects = relay.on_client_message(ClientMessage::AudioChunk {
            data: "AAAA".to_string(),
        });
        assert_eq!(effects, vec![RelayEffect::ForwardAudio("AAAA".to_string())]);
        assert_eq!(relay.state(), RelayState::Listening);

        // Listening -> Processing on commit.
        let effects = relay.on_client_message(ClientMessage::Commit);
        assert_eq!(effects, vec![RelayEffect::CommitUpstream]);
        assert_eq!(relay.state(), RelayState::Processing);

        // Processing -> Speaking on the first delta.
        let effects = relay.on_upstream_event(delta("BBBB"));
        assert_eq!(
            effects,
            vec![RelayEffect::Send(ServerMessage::AudioOut {
                data: "BBBB".to_string(),
                sample_rate: Some(24000),
            })]
        );
        assert_eq!(relay.state(), RelayState::Speaking);

        // Barge-in: cancel goes upstream strictly before the client is told.
        let effects = relay.on_client_message(ClientMessage::Interrupt);
        assert_eq!(
            effects,
            vec![
                RelayEffect::CancelUpstream,
                RelayEffect::Send(ServerMessage::ResponseInterrupted),
            ]
        );
        assert_eq!(relay.state(), RelayState::Interrupted);

        // A stale delta for the cancelled turn must be dropped.
        let effects = relay.on_upstream_event(delta("CCCC"));
        assert!(effects.is_empty());

        // So must the completion event for that turn.
        let effects = relay.on_upstream_event(UpstreamEvent::Completed);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_completion_returns_to_ready() {
        let mut relay = ready_relay();
        relay.on_client_message(ClientMessage::AudioChunk { data: "A".into() });
        relay.on_client_message(ClientMessage::Commit);
        relay.on_upstream_event(delta("B"));

        let effects = relay.on_upstream_event(UpstreamEvent::Completed);
        assert_eq!(effects, vec![RelayEffect::Send(ServerMessage::ResponseCompleted)]);
        assert_eq!(relay.state(), RelayState::Ready);
    }

    #[test]
    fn test_interrupt_while_idle_only_cancels() {
        let mut relay = ready_relay();
        let effects = relay.on_client_message(ClientMessage::Interrupt);
        assert_eq!(effects, vec![RelayEffect::CancelUpstream]);
        // No downstream interruption event, no state change.
        assert_eq!(relay.state(), RelayState::Ready);
    }

    #[test]
    fn test_new_turn_after_interrupt() {
        let mut relay = ready_relay();
        relay.on_client_message(ClientMessage::AudioChunk { data: "A".into() });
        relay.on_client_message(ClientMessage::Commit);
        let first_turn = relay.current_turn();
        relay.on_client_message(ClientMessage::Interrupt);

        // Interrupted is immediately re-enterable as Listening.
        let effects = relay.on_client_message(ClientMessage::AudioChunk { data: "B".into() });
        assert_eq!(effects, vec![RelayEffect::ForwardAudio("B".to_string())]);
        assert_eq!(relay.state(), RelayState::Listening);

        relay.on_client_message(ClientMessage::Commit);
        assert!(relay.current_turn() > first_turn);

        // The new turn receives audio normally.
        let effects = relay.on_upstream_event(delta("C"));
        assert_eq!(effects.len(), 1);
        assert_eq!(relay.state(), RelayState::Speaking);
    }

    #[test]
    fn test_commit_outside_listening_is_ignored() {
        let mut relay = ready_relay();
        assert!(relay.on_client_message(ClientMessage::Commit).is_empty());
        assert_eq!(relay.state(), RelayState::Ready);
        assert_eq!(relay.current_turn(), 0);
    }

    #[test]
    fn test_upstream_interrupted_event_notifies_client_once() {
        let mut relay = ready_relay();
        relay.on_client_message(ClientMessage::AudioChunk { data: "A".into() });
        relay.on_client_message(ClientMessage::Commit);
        relay.on_upstream_event(delta("B"));

        // Upstream-initiated interruption notifies the client.
        let effects = relay.on_upstream_event(UpstreamEvent::Interrupted);
        assert_eq!(effects, vec![RelayEffect::Send(ServerMessage::ResponseInterrupted)]);

        // A second ack for the same turn is dropped.
        assert!(relay.on_upstream_event(UpstreamEvent::Interrupted).is_empty());
    }

    #[test]
    fn test_upstream_error_is_isolated() {
        let mut relay = ready_relay();
        relay.on_client_message(ClientMessage::AudioChunk { data: "A".into() });
        relay.on_client_message(ClientMessage::Commit);

        let effects = relay.on_upstream_event(UpstreamEvent::Error {
            error: "rate limited".to_string(),
        });
        assert_eq!(
            effects,
            vec![RelayEffect::Send(ServerMessage::Error {
                error: "rate limited".to_string(),
            })]
        );
        // The session and the active turn survive.
        assert_eq!(relay.state(), RelayState::Processing);
        let effects = relay.on_upstream_event(delta("B"));
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_close_is_terminal() {
        let mut relay = ready_relay();
        let effects = relay.connection_closed();
        assert_eq!(effects, vec![RelayEffect::CloseUpstream]);
        assert_eq!(relay.state(), RelayState::Closed);

        assert!(relay
            .on_client_message(ClientMessage::AudioChunk { data: "A".into() })
            .is_empty());
        assert!(relay.on_upstream_event(delta("B")).is_empty());
        assert!(relay.connection_closed().is_empty());
    }

    #[test]
    fn test_audio_forwarded_while_connecting_degrades_silently() {
        let mut relay = SessionRelay::new();
        // Chunks sent before negotiation completes are still forwarded; the
        // upstream client no-ops until ready.
        let effects = relay.on_client_message(ClientMessage::AudioChunk { data: "A".into() });
        assert_eq!(effects, vec![RelayEffect::ForwardAudio("A".to_string())]);
        assert_eq!(relay.state(), RelayState::Connecting);
    }
}
