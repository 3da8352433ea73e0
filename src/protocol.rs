//! # Wire Protocols
//!
//! Message types for the two WebSocket boundaries the relay bridges.
//!
//! ## Downstream (local client ⇄ relay):
//! JSON objects with a `type` discriminator:
//! - **Client → Relay**: `client.audio_chunk`, `client.commit`,
//!   `client.interrupt`
//! - **Relay → Client**: `audio_out`, `response_completed`,
//!   `response_interrupted`, `error`
//!
//! ## Upstream (relay ⇄ voice service):
//! The provider's session protocol, reproduced bit-for-bit for interop:
//! - **Outbound**: `session.create`, `input_audio_buffer.append`,
//!   `input_audio_buffer.commit`, `response.create`, `response.cancel`
//! - **Inbound**: `session.created`, `response.audio_delta`,
//!   `response.completed`, `response.interrupted`, `error`
//!
//! Audio payloads on both boundaries are base64-encoded 16-bit PCM; 16 kHz
//! going upstream, 24 kHz (unless declared otherwise) coming back.

use serde::{Deserialize, Serialize};

/// Sample rate of audio sent upstream (Hz).
pub const TRANSPORT_SAMPLE_RATE: u32 = 16000;

/// Default sample rate of audio received from the upstream service (Hz),
/// used when an audio delta does not declare its own rate.
pub const DEFAULT_RESPONSE_SAMPLE_RATE: u32 = 24000;

/// MIME type declared on upstream audio appends.
pub const UPSTREAM_AUDIO_MIME: &str = "audio/pcm;rate=16000";

/// Messages from the local client to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// One transport-encoded PCM16 chunk at 16 kHz
    #[serde(rename = "client.audio_chunk")]
    AudioChunk { data: String },

    /// End of the current utterance; request a response
    #[serde(rename = "client.commit")]
    Commit,

    /// Cancel the current response (barge-in)
    #[serde(rename = "client.interrupt")]
    Interrupt,
}

/// Messages from the relay to the local client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// One transport-encoded PCM16 chunk of synthesized audio.
    /// `sample_rate` is present only when the upstream event declared one.
    #[serde(rename = "audio_out")]
    AudioOut {
        data: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sample_rate: Option<u32>,
    },

    /// The current response finished; playback drains naturally
    #[serde(rename = "response_completed")]
    ResponseCompleted,

    /// The current response was cancelled; the client flushes playback
    #[serde(rename = "response_interrupted")]
    ResponseInterrupted,

    /// A relay- or upstream-side error, informational for the client
    #[serde(rename = "error")]
    Error { error: String },
}

/// Outbound messages on the upstream connection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum UpstreamMessage {
    #[serde(rename = "session.create")]
    SessionCreate { session: SessionParams },

    #[serde(rename = "input_audio_buffer.append")]
    AudioAppend { audio: AudioAppendPayload },

    #[serde(rename = "input_audio_buffer.commit")]
    AudioCommit,

    #[serde(rename = "response.create")]
    ResponseCreate,

    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

/// Session negotiation parameters sent with `session.create`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionParams {
    pub model: String,
    pub response: ResponseParams,
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseParams {
    pub modalities: Vec<String>,
    pub audio_config: AudioConfigParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioConfigParams {
    pub encoding: String,
    pub sample_rate_hz: u32,
}

/// Audio payload for `input_audio_buffer.append`.
#[derive(Debug, Clone, Serialize)]
pub struct AudioAppendPayload {
    pub mime_type: String,
    pub data: String,
}

impl UpstreamMessage {
    /// Build the session negotiation message: audio-only response modality,
    /// LINEAR16 PCM output at the default response rate, and the
    /// caller-supplied system instructions.
    pub fn session_create(model: &str, system_prompt: &str) -> Self {
        UpstreamMessage::SessionCreate {
            session: SessionParams {
                model: model.to_string(),
                response: ResponseParams {
                    modalities: vec!["AUDIO".to_string()],
                    audio_config: AudioConfigParams {
                        encoding: "LINEAR16_PCM".to_string(),
                        sample_rate_hz: DEFAULT_RESPONSE_SAMPLE_RATE,
                    },
                },
                instructions: system_prompt.to_string(),
            },
        }
    }

    /// Build an audio append carrying one 16 kHz transport chunk.
    pub fn audio_append(data: String) -> Self {
        UpstreamMessage::AudioAppend {
            audio: AudioAppendPayload {
                mime_type: UPSTREAM_AUDIO_MIME.to_string(),
                data,
            },
        }
    }
}

/// Inbound events on the upstream connection, after session negotiation.
///
/// `session.created` is consumed inside the session client's `open()` and
/// never reaches the relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamEvent {
    /// One chunk of synthesized response audio
    #[serde(rename = "response.audio_delta")]
    AudioDelta { audio: AudioDeltaPayload },

    /// The response finished generating
    #[serde(rename = "response.completed")]
    Completed,

    /// The upstream service acknowledged (or initiated) an interruption
    #[serde(rename = "response.interrupted")]
    Interrupted,

    /// An upstream error event; the session continues
    #[serde(rename = "error")]
    Error { error: String },
}

/// Audio payload of a `response.audio_delta` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AudioDeltaPayload {
    pub data: String,

    /// Declared source rate; authoritative when present, otherwise the
    /// documented default (24000 Hz) applies
    #[serde(default)]
    pub sample_rate_hz: Option<u32>,
}
