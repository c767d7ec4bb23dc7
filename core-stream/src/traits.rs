//! # Stream Engine Traits
//!
//! Seams between the merge pipeline and its pluggable parts. These differ
//! from the bridge-traits definitions, which expose host adapters; the traits
//! here are implemented inside the core (and by test doubles).
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use core_stream::{SegmentDecoder, SymphoniaDecoder};
//! use bytes::Bytes;
//!
//! # async fn example(data: Bytes) -> core_stream::Result<()> {
//! let decoder = SymphoniaDecoder::new();
//! let buffer = decoder.decode(data, Some("chapter/seg-1.mp3")).await?;
//! println!("{} channels, {:.2}s", buffer.channel_count(), buffer.duration());
//! # Ok(())
//! # }
//! ```

use crate::audio::DecodedBuffer;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Codec families recognised in segment audio.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// MPEG-1 Audio Layer 3
    Mp3,
    /// Advanced Audio Coding (AAC/M4A)
    Aac,
    /// Free Lossless Audio Codec
    Flac,
    /// Ogg Vorbis
    Vorbis,
    /// Opus
    Opus,
    /// PCM in a WAV container
    Wav,
    /// Apple Lossless Audio Codec
    Alac,
    Unknown,
}

/// Decodes one segment's encoded bytes into a planar buffer.
///
/// Implementations must be deterministic: the same bytes always produce the
/// same buffer. The merge engine relies on this when it serves a cached
/// buffer in place of a fresh decode.
#[async_trait]
pub trait SegmentDecoder: Send + Sync {
    /// Decode a complete encoded file.
    ///
    /// # Arguments
    ///
    /// * `data` - Full encoded audio (any container the decoder supports)
    /// * `hint` - Optional path or file name used to guess the container
    ///
    /// # Errors
    ///
    /// Returns a decode-class [`StreamError`](crate::StreamError) when the
    /// data is not recognised or is corrupt.
    async fn decode(&self, data: Bytes, hint: Option<&str>) -> Result<DecodedBuffer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_serialization() {
        let json = serde_json::to_string(&AudioCodec::Vorbis).unwrap();
        assert_eq!(json, "\"vorbis\"");
    }
}
