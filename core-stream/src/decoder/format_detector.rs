//! # Format Detection Module
//!
//! Probe hints and codec identification for Symphonia.

use crate::traits::AudioCodec;
use symphonia::core::codecs::CodecType;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Format detector for segment audio.
pub struct FormatDetector;

impl FormatDetector {
    /// Create a probe hint from an audio path or URL.
    ///
    /// Query strings and fragments are ignored, so cache-busted URLs still
    /// yield their extension.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_stream::FormatDetector;
    ///
    /// let hint = FormatDetector::hint_from_path("/api/audio/seg-1.mp3?v=1714564800000");
    /// // Hint will contain extension "mp3"
    /// ```
    pub fn hint_from_path(path: &str) -> Hint {
        let mut hint = Hint::new();

        match Self::extension(path) {
            Some(extension) => {
                debug!("Setting probe hint extension: {}", extension);
                hint.with_extension(extension);
            }
            None => debug!("No file extension found, probe will auto-detect"),
        }

        hint
    }

    /// Create a probe hint from a MIME type such as `audio/mpeg`.
    pub fn hint_from_mime_type(mime_type: &str) -> Hint {
        let mut hint = Hint::new();
        hint.mime_type(mime_type);
        hint
    }

    /// Lowercase extension of the last path component.
    pub fn extension(path: &str) -> Option<&str> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let file = path.rsplit('/').next().unwrap_or(path);
        let (stem, ext) = file.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext)
    }

    /// Map Symphonia's codec type to [`AudioCodec`].
    pub fn detect_codec(codec_type: CodecType) -> AudioCodec {
        use symphonia::core::codecs::*;

        if codec_type == CODEC_TYPE_MP3 {
            AudioCodec::Mp3
        } else if codec_type == CODEC_TYPE_AAC {
            AudioCodec::Aac
        } else if codec_type == CODEC_TYPE_FLAC {
            AudioCodec::Flac
        } else if codec_type == CODEC_TYPE_VORBIS {
            AudioCodec::Vorbis
        } else if codec_type == CODEC_TYPE_OPUS {
            AudioCodec::Opus
        } else if codec_type == CODEC_TYPE_ALAC {
            AudioCodec::Alac
        } else if codec_type == CODEC_TYPE_PCM_S16LE
            || codec_type == CODEC_TYPE_PCM_S16BE
            || codec_type == CODEC_TYPE_PCM_S24LE
            || codec_type == CODEC_TYPE_PCM_S24BE
            || codec_type == CODEC_TYPE_PCM_S32LE
            || codec_type == CODEC_TYPE_PCM_S32BE
            || codec_type == CODEC_TYPE_PCM_F32LE
            || codec_type == CODEC_TYPE_PCM_F32BE
            || codec_type == CODEC_TYPE_PCM_F64LE
            || codec_type == CODEC_TYPE_PCM_F64BE
            || codec_type == CODEC_TYPE_PCM_U8
        {
            AudioCodec::Wav
        } else {
            warn!("Unknown codec type: {:?}", codec_type);
            AudioCodec::Unknown
        }
    }
}
