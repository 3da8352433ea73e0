//! # Capture Pipeline
//!
//! Accumulates raw microphone samples, frames them into fixed 30 ms blocks at
//! the input rate, resamples each block to the transport rate, quantizes to
//! 16-bit PCM and emits base64 transport chunks.
//!
//! ## Latency bound:
//! A chunk is emitted as soon as one full frame has accumulated, so emission
//! latency is bounded by the frame duration (~30 ms) and chunk boundaries
//! never split a frame. A partial trailing frame stays buffered until enough
//! samples arrive or `reset()` discards it.
//!
//! ## Real-time constraints:
//! `ingest` is the only operation meant to run inside the audio-input
//! callback. It takes no locks and does bounded work per frame (resample +
//! quantize + encode), keeping well inside the callback's time budget.

use crate::audio::codec;
use crate::audio::resample::resample;
use std::collections::VecDeque;

/// Frame duration used for chunking, in milliseconds.
pub const FRAME_DURATION_MS: usize = 30;

/// One transport-ready unit of audio.
///
/// The payload decodes deterministically back to the exact int16 byte
/// sequence that was encoded; the sample rate tags which rate those samples
/// are at on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportChunk {
    /// Base64-encoded little-endian 16-bit PCM
    pub data: String,

    /// Sample rate of the encoded audio (Hz)
    pub sample_rate: u32,
}

/// Capture pipeline state: rates fixed at creation, an unbounded buffer of
/// not-yet-framed raw samples.
///
/// Owned exclusively by the audio-input callback context; it is not shared
/// between threads and needs no locking.
pub struct CapturePipeline {
    /// Sample rate the microphone delivers at (Hz)
    input_rate: u32,

    /// Transport sample rate chunks are emitted at (Hz)
    target_rate: u32,

    /// Samples per frame at the input rate: floor(input_rate * 0.03)
    frame_size: usize,

    /// Raw samples awaiting framing, strictly FIFO
    buffer: VecDeque<f32>,
}

impl CapturePipeline {
    /// Create a pipeline capturing at `input_rate` and emitting transport
    /// chunks at `target_rate` (16000 Hz on the wire).
    pub fn new(input_rate: u32, target_rate: u32) -> Self {
        let frame_size = input_rate as usize * FRAME_DURATION_MS / 1000;
        Self {
            input_rate,
            target_rate,
            frame_size,
            buffer: VecDeque::new(),
        }
    }

    /// Samples per emitted frame at the input rate.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of raw samples currently buffered (the pending partial frame).
    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Append raw microphone samples and emit zero or more transport chunks.
    ///
    /// While at least one full frame is buffered, exactly one frame's worth is
    /// removed from the front, resampled to the target rate, quantized and
    /// encoded. Ordering is strictly FIFO.
    pub fn ingest(&mut self, raw_samples: &[f32]) -> Vec<TransportChunk> {
        self.buffer.extend(raw_samples.iter().copied());

        let mut chunks = Vec::new();
        while self.buffer.len() >= self.frame_size {
            let frame: Vec<f32> = self.buffer.drain(..self.frame_size).collect();
            let resampled = resample(&frame, self.input_rate, self.target_rate);
            let pcm16 = codec::float_buffer_to_int16(&resampled);
            chunks.push(TransportChunk {
                data: codec::encode_pcm16(&pcm16),
                sample_rate: self.target_rate,
            });
        }

        chunks
    }

    /// Discard all buffered, not-yet-framed samples without emitting a chunk.
    ///
    /// Used when capture restarts after an interruption so stale pre-interrupt
    /// audio is never sent.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
