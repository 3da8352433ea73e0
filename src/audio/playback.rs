//! # Playback Pipeline
//!
//! Receives transport-encoded audio chunks, decodes and resamples them to the
//! output device rate, and queues them in a FIFO ring buffer that the output
//! device callback drains at its own cadence.
//!
//! ## Contract:
//! - `append` preserves arrival order: chunks land at the tail in invocation
//!   order, never reordered, even though resampling happens per-chunk
//! - `drain` never blocks: if fewer samples are buffered than requested, the
//!   whole output is silence (underrun is expected behavior, not an error)
//! - `flush` discards everything not yet played, used on interruption
//!
//! A running RMS loudness value over at most the first 2048 buffered samples
//! is recomputed after every append and drain for UI level-meter feedback;
//! it is advisory telemetry, not part of the audio-correctness contract.

use crate::audio::codec;
use crate::audio::resample::resample;
use crate::error::RelayError;
use std::collections::VecDeque;

/// Maximum number of buffered samples inspected for the loudness metric.
const LOUDNESS_WINDOW: usize = 2048;

/// FIFO playback buffer at the output device's native rate.
///
/// Owned exclusively by the playback side: appended to by inbound-chunk
/// handling, drained by the output-device callback.
pub struct PlaybackPipeline {
    /// Not-yet-emitted output samples, strictly FIFO
    buffer: VecDeque<f32>,

    /// Output device sample rate (Hz)
    device_rate: u32,

    /// Most recently declared source rate for inbound audio (Hz).
    /// Defaults to 24000 Hz until a chunk declares otherwise.
    source_rate: u32,

    /// Last computed loudness value, normalized to roughly [0, 1]
    level: f32,
}

impl PlaybackPipeline {
    /// Create a playback pipeline for a device running at `device_rate`,
    /// assuming inbound audio arrives at `default_source_rate` until a chunk
    /// declares its own rate.
    pub fn new(device_rate: u32, default_source_rate: u32) -> Self {
        Self {
            buffer: VecDeque::new(),
            device_rate,
            source_rate: default_source_rate,
            level: 0.0,
        }
    }

    /// Number of samples queued and not yet drained.
    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Decode a transport chunk and append it to the tail of the buffer.
    ///
    /// ## Parameters:
    /// - **data**: base64 transport-encoded 16-bit PCM
    /// - **declared_rate**: source rate declared with this chunk, if any.
    ///   A declared rate is authoritative and sticks for subsequent chunks
    ///   that do not declare one.
    ///
    /// ## Errors:
    /// [`RelayError::Decode`] if the payload is invalid; nothing is appended
    /// and previously queued audio is unaffected.
    pub fn append(&mut self, data: &str, declared_rate: Option<u32>) -> Result<(), RelayError> {
        if let Some(rate) = declared_rate {
            self.source_rate = rate;
        }

        let pcm16 = codec::decode_pcm16(data)?;
        let floats = codec::int16_buffer_to_float(&pcm16);
        let resampled = resample(&floats, self.source_rate, self.device_rate);

        self.buffer.extend(resampled);
        self.update_level();
        Ok(())
    }

    /// Drain `requested` samples for the output device callback.
    ///
    /// If enough samples are buffered, exactly that many are removed from the
    /// head (FIFO). Otherwise the entire output is silence and the buffer is
    /// left untouched; the callback must never wait for more data.
    pub fn drain(&mut self, requested: usize) -> Vec<f32> {
        let out = if self.buffer.len() >= requested {
            self.buffer.drain(..requested).collect()
        } else {
            vec![0.0; requested]
        };
        self.update_level();
        out
    }

    /// Discard all buffered, not-yet-played samples.
    ///
    /// Used on interruption so playback does not continue into audio
    /// belonging to a cancelled response.
    pub fn flush(&mut self) {
        self.buffer.clear();
        self.update_level();
    }

    /// Current loudness value for level-meter feedback, roughly in [0, 1].
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Root-mean-square over at most the first `LOUDNESS_WINDOW` buffered
    /// samples.
    fn update_level(&mut self) {
        let window = self.buffer.len().min(LOUDNESS_WINDOW);
        if window == 0 {
            self.level = 0.0;
            return;
        }
        let energy: f32 = self
            .buffer
            .iter()
            .take(window)
            .map(|s| s * s)
            .sum::<f32>()
            / window as f32;
        self.level = energy.sqrt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::{encode_pcm16, float_to_int16};

    fn chunk_of(value: f32, samples: usize) -> String {
        encode_pcm16(&vec![float_to_int16(value); samples])
    }

    #[test]
    fn test_fifo_order_preserved_across_chunks() {
        // Same source and device rate so samples pass through unscaled.
        let mut playback = PlaybackPipeline::new(24000, 24000);
        playback.append(&chunk_of(0.5, 100), None).unwrap();
        playback.append(&chunk_of(-0.5, 100), None).unwrap();

        let out = playback.drain(200);
        assert!(out[..100].iter().all(|&s| s > 0.0));
        assert!(out[100..].iter().all(|&s| s < 0.0));
    }

    #[test]
    fn test_underrun_yields_silence_without_consuming() {
        let mut playback = PlaybackPipeline::new(24000, 24000);
        playback.append(&chunk_of(0.5, 50), None).unwrap();

        // More requested than buffered: all silence, buffer untouched.
        let out = playback.drain(128);
        assert_eq!(out.len(), 128);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(playback.buffered_samples(), 50);
    }

    #[test]
    fn test_flush_clears_pending_audio() {
        let mut playback = PlaybackPipeline::new(24000, 24000);
        playback.append(&chunk_of(0.9, 256), None).unwrap();
        playback.flush();

        assert_eq!(playback.buffered_samples(), 0);
        let out = playback.drain(64);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_resamples_to_device_rate() {
        // 24 kHz source into a 48 kHz device: twice the samples.
        let mut playback = PlaybackPipeline::new(48000, 24000);
        playback.append(&chunk_of(0.25, 240), None).unwrap();
        assert_eq!(playback.buffered_samples(), 480);
    }

    #[test]
    fn test_declared_rate_overrides_default() {
        let mut playback = PlaybackPipeline::new(48000, 24000);
        // Chunk declares 48 kHz: no resampling despite the 24 kHz default.
        playback.append(&chunk_of(0.25, 480), Some(48000)).unwrap();
        assert_eq!(playback.buffered_samples(), 480);

        // The declared rate sticks for undeclared follow-ups.
        playback.append(&chunk_of(0.25, 480), None).unwrap();
        assert_eq!(playback.buffered_samples(), 960);
    }

    #[test]
    fn test_invalid_chunk_leaves_buffer_intact() {
        let mut playback = PlaybackPipeline::new(24000, 24000);
        playback.append(&chunk_of(0.5, 100), None).unwrap();
        assert!(playback.append("@@not base64@@", None).is_err());
        assert_eq!(playback.buffered_samples(), 100);
    }

    #[test]
    fn test_loudness_tracks_buffer_content() {
        let mut playback = PlaybackPipeline::new(24000, 24000);
        assert_eq!(playback.level(), 0.0);

        playback.append(&chunk_of(0.5, 512), None).unwrap();
        let level = playback.level();
        assert!(level > 0.4 && level < 0.6, "unexpected level {}", level);

        playback.flush();
        assert_eq!(playback.level(), 0.0);
    }
}
