//! # PCM Codec
//!
//! Conversions between the in-process audio format (32-bit floats in
//! [-1.0, 1.0]) and the wire format (base64-encoded little-endian 16-bit PCM).
//!
//! ## Key Functions:
//! - **Quantization**: `float_to_int16` / `int16_to_float` with the asymmetric
//!   32767/32768 scaling the upstream protocol expects
//! - **Transport encoding**: `encode_pcm16` / `decode_pcm16` as an exact
//!   inverse pair (lossless at the byte level)
//!
//! Decoding failures are reported as [`RelayError::Decode`]; the caller drops
//! the offending chunk and the session continues.

use crate::error::RelayError;
use base64::Engine;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Quantize one float sample to 16-bit signed PCM.
///
/// Clamps to [-1.0, 1.0] first, then scales by 32767 for positive values and
/// 32768 for negative ones. The asymmetry matches the wire format produced by
/// the capture side and must be preserved exactly for round-trip expectations.
pub fn float_to_int16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Convert one 16-bit PCM sample back to a float in [-1.0, 1.0).
pub fn int16_to_float(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Encode 16-bit PCM samples as base64 text for the transport.
///
/// Samples are serialized little-endian, two bytes each, then base64-encoded
/// with the standard alphabet.
pub fn encode_pcm16(samples: &[i16]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        // Writing i16 into a Vec cannot fail
        bytes.write_i16::<LittleEndian>(sample).unwrap();
    }
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 transport text back into 16-bit PCM samples.
///
/// ## Errors:
/// Returns [`RelayError::Decode`] if the text is not valid base64 or the
/// decoded byte count is odd (a 16-bit sample was split).
pub fn decode_pcm16(data: &str) -> Result<Vec<i16>, RelayError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| RelayError::Decode(format!("invalid base64 audio payload: {}", e)))?;

    if bytes.len() % 2 != 0 {
        return Err(RelayError::Decode(format!(
            "PCM payload has odd byte length: {}",
            bytes.len()
        )));
    }

    let mut cursor = Cursor::new(bytes);
    let mut samples = Vec::with_capacity(cursor.get_ref().len() / 2);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(sample);
    }

    Ok(samples)
}

/// Quantize a float buffer to 16-bit PCM.
pub fn float_buffer_to_int16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| float_to_int16(s)).collect()
}

/// Convert a 16-bit PCM buffer to floats.
pub fn int16_buffer_to_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| int16_to_float(s)).collect()
}
