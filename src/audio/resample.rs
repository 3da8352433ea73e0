//! # Sample Rate Conversion
//!
//! Linear-interpolation resampler shared by the capture and playback pipelines.
//! This is deliberately a low-quality, low-cost resampler: no anti-aliasing
//! filter, just a straight interpolation between neighboring input samples.
//! Voice-bandwidth signals tolerate it, and it always finishes well inside the
//! time budget of a real-time audio callback.
//!
//! ## Algorithm:
//! - Equal rates: return the input unchanged
//! - Otherwise `ratio = in_rate / out_rate`, output length `floor(len / ratio)`,
//!   and output sample `i` interpolates between input samples `floor(i * ratio)`
//!   and the next one (clamped to the last valid index at the tail)

/// Convert a sequence of float samples from one sample rate to another.
///
/// ## Parameters:
/// - **input**: Source samples in [-1.0, 1.0]
/// - **in_rate**: Sample rate the input was captured at (Hz)
/// - **out_rate**: Desired output sample rate (Hz)
///
/// ## Returns:
/// A new sample sequence approximating the same signal at `out_rate`.
/// Output length is `floor(input.len() * out_rate / in_rate)`.
pub fn resample(input: &[f32], in_rate: u32, out_rate: u32) -> Vec<f32> {
    if in_rate == out_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = in_rate as f64 / out_rate as f64;
    let out_len = (input.len() as f64 / ratio).floor() as usize;
    let last = input.len() - 1;

    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let idx = i as f64 * ratio;
        let i0 = idx.floor() as usize;
        // The right-hand neighbor clamps to the last valid index so the final
        // output sample never reads out of bounds.
        let i1 = (i0 + 1).min(last);
        let frac = (idx - i0 as f64) as f32;
        output.push(input[i0] * (1.0 - frac) + input[i1] * frac);
    }

    output
}
