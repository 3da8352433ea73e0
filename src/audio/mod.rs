//! # Audio Processing Module
//!
//! Real-time audio plumbing for the voice relay: rate conversion, PCM
//! quantization and transport encoding, and the capture/playback pipelines
//! that sit inside the client's audio callbacks.
//!
//! ## Key Components:
//! - **Resampler**: linear-interpolation rate conversion (capture + playback)
//! - **Codec**: float ⇄ int16 ⇄ base64 transport text
//! - **Capture Pipeline**: 30 ms framing of microphone audio into 16 kHz chunks
//! - **Playback Pipeline**: FIFO ring buffer drained by the output callback
//!
//! ## Audio Format:
//! - In-process: 32-bit float samples in [-1.0, 1.0]
//! - On the wire: base64-encoded little-endian 16-bit PCM, mono
//! - Transport rate: 16 kHz upstream, 24 kHz (default) downstream

pub mod capture;   // Microphone framing and chunk emission
pub mod codec;     // PCM quantization and transport encoding
pub mod playback;  // Output ring buffer with loudness metering
pub mod resample;  // Linear-interpolation sample rate conversion
