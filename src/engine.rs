//! # Client Audio Engine
//!
//! Headless client-side counterpart to the relay: wires the capture and
//! playback pipelines to the downstream message protocol so a UI only has to
//! move audio buffers and WebSocket frames in and out.
//!
//! ## Execution contexts:
//! The engine is designed around the two real-time callbacks of an audio
//! device plus one control context:
//! - the input callback feeds [`AudioEngine::on_mic_samples`] and ships the
//!   returned messages over the socket
//! - the output callback pulls from [`AudioEngine::render`]
//! - the socket reader feeds [`AudioEngine::on_server_message`]
//!
//! None of these methods block or perform I/O; everything heavier than a
//! buffer operation (resampling, codec work) is bounded per 30 ms frame.
//!
//! ## Interruption:
//! The relay's `response_interrupted` is the flush instruction: on receiving
//! it the engine flushes playback (stale audio never reaches the speaker) and
//! resets capture (stale pre-interrupt microphone audio is never sent when
//! capture restarts). Completion, by contrast, lets the playback buffer drain
//! naturally.

use crate::audio::capture::CapturePipeline;
use crate::audio::playback::PlaybackPipeline;
use crate::protocol::{
    ClientMessage, ServerMessage, DEFAULT_RESPONSE_SAMPLE_RATE, TRANSPORT_SAMPLE_RATE,
};
use tracing::{debug, warn};

/// Capture + playback + protocol glue for one client session.
pub struct AudioEngine {
    capture: CapturePipeline,
    playback: PlaybackPipeline,
    /// Whether a synthesized response is currently being received
    speaking: bool,
}

impl AudioEngine {
    /// Create an engine for a device capturing at `input_rate` and playing
    /// back at `output_rate`.
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        Self {
            capture: CapturePipeline::new(input_rate, TRANSPORT_SAMPLE_RATE),
            playback: PlaybackPipeline::new(output_rate, DEFAULT_RESPONSE_SAMPLE_RATE),
            speaking: false,
        }
    }

    /// Whether response audio is currently arriving.
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Feed raw microphone samples from the input callback; returns the
    /// messages to send to the relay (zero or more audio chunks).
    pub fn on_mic_samples(&mut self, samples: &[f32]) -> Vec<ClientMessage> {
        self.capture
            .ingest(samples)
            .into_iter()
            .map(|chunk| ClientMessage::AudioChunk { data: chunk.data })
            .collect()
    }

    /// End the current utterance (button released).
    pub fn commit(&mut self) -> ClientMessage {
        ClientMessage::Commit
    }

    /// Barge-in (stop button). Capture restarts clean on the next utterance;
    /// playback is flushed when the relay confirms with
    /// `response_interrupted`.
    pub fn interrupt(&mut self) -> ClientMessage {
        self.speaking = false;
        ClientMessage::Interrupt
    }

    /// Handle one message from the relay.
    pub fn on_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::AudioOut { data, sample_rate } => {
                self.speaking = true;
                if let Err(e) = self.playback.append(&data, sample_rate) {
                    // Dropped chunk, no session-level effect.
                    warn!(error = %e, "dropping undecodable audio chunk");
                }
            }
            ServerMessage::ResponseCompleted => {
                // Buffered audio finishes draining naturally.
                debug!("response completed");
                self.speaking = false;
            }
            ServerMessage::ResponseInterrupted => {
                debug!("response interrupted, flushing playback");
                self.speaking = false;
                self.playback.flush();
                self.capture.reset();
            }
            ServerMessage::Error { error } => {
                warn!(error = %error, "relay reported error");
            }
        }
    }

    /// Pull `requested` output samples for the device callback; silence on
    /// underrun.
    pub fn render(&mut self, requested: usize) -> Vec<f32> {
        self.playback.drain(requested)
    }

    /// Current playback loudness for level-meter feedback, roughly [0, 1].
    pub fn level(&self) -> f32 {
        self.playback.level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::{encode_pcm16, float_to_int16};

    fn audio_out(value: f32, samples: usize) -> ServerMessage {
        ServerMessage::AudioOut {
            data: encode_pcm16(&vec![float_to_int16(value); samples]),
            sample_rate: Some(24000),
        }
    }

    #[test]
    fn test_mic_samples_become_chunks() {
        let mut engine = AudioEngine::new(48000, 24000);
        // One 30 ms frame at 48 kHz.
        let messages = engine.on_mic_samples(&vec![0.1f32; 1440]);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ClientMessage::AudioChunk { .. }));

        // A partial frame yields nothing yet.
        let messages = engine.on_mic_samples(&vec![0.1f32; 100]);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_playback_path_and_levels() {
        let mut engine = AudioEngine::new(48000, 24000);
        assert!(!engine.is_speaking());

        engine.on_server_message(audio_out(0.5, 480));
        assert!(engine.is_speaking());
        assert!(engine.level() > 0.0);

        let out = engine.render(480);
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_completed_drains_naturally() {
        let mut engine = AudioEngine::new(48000, 24000);
        engine.on_server_message(audio_out(0.5, 480));
        engine.on_server_message(ServerMessage::ResponseCompleted);
        assert!(!engine.is_speaking());

        // No flush on completion: the queued audio still plays out.
        let out = engine.render(480);
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_interrupted_flushes_playback_and_capture() {
        let mut engine = AudioEngine::new(48000, 24000);
        engine.on_server_message(audio_out(0.5, 480));

        // Half a capture frame is pending when the interrupt lands.
        assert!(engine.on_mic_samples(&vec![0.2f32; 720]).is_empty());

        engine.on_server_message(ServerMessage::ResponseInterrupted);
        assert!(!engine.is_speaking());

        // Playback is silent after the flush.
        let out = engine.render(64);
        assert!(out.iter().all(|&s| s == 0.0));

        // The pending half-frame was discarded; a fresh half-frame still
        // does not complete a chunk.
        assert!(engine.on_mic_samples(&vec![0.2f32; 720]).is_empty());
    }

    #[test]
    fn test_undecodable_chunk_is_dropped() {
        let mut engine = AudioEngine::new(48000, 24000);
        engine.on_server_message(ServerMessage::AudioOut {
            data: "!!!".to_string(),
            sample_rate: None,
        });
        let out = engine.render(64);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
