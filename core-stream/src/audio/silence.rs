//! Silence synthesis for dividers and automatic pauses.

use crate::audio::buffer::DecodedBuffer;
use crate::audio::encoder::encode_wav;
use crate::error::Result;
use bytes::Bytes;

/// Number of frames covering `duration_ms` at `sample_rate`.
pub fn silence_frames(duration_ms: u64, sample_rate: u32) -> usize {
    (duration_ms as f64 * sample_rate as f64 / 1000.0).round() as usize
}

/// Zero-amplitude buffer of `duration_ms` milliseconds.
pub fn silence_buffer(duration_ms: u64, sample_rate: u32, channels: u16) -> DecodedBuffer {
    DecodedBuffer::zeroed(sample_rate, channels, silence_frames(duration_ms, sample_rate))
}

/// Encoded WAV silence, the raw form cached for divider segments.
pub fn silence_wav(duration_ms: u64, sample_rate: u32, channels: u16) -> Result<Bytes> {
    encode_wav(&silence_buffer(duration_ms, sample_rate, channels))
}
