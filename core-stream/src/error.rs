//! # Stream Error Types
//!
//! Error types for segment loading, decoding and merging.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur while building the merged chapter stream.
#[derive(Error, Debug)]
pub enum StreamError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// A standard segment has no audio reference.
    #[error("Segment {0} has no audio path")]
    MissingAudio(String),

    /// The audio endpoint answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { status: u16, url: String },

    /// Network fetch failed before a response arrived.
    #[error("Failed to fetch segment audio: {0}")]
    Fetch(String),

    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// Audio format is not recognized or cannot be parsed.
    #[error("Unsupported or invalid audio format: {0}")]
    InvalidFormat(String),

    /// Codec is not supported by the decoder.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// Error occurred during audio decoding.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Audio stream is corrupted or contains invalid data.
    #[error("Corrupted audio stream: {0}")]
    CorruptedStream(String),

    /// Decoder encountered an internal error.
    #[error("Decoder internal error: {0}")]
    DecoderError(String),

    // ========================================================================
    // Output Errors
    // ========================================================================
    /// Encoding the merged output failed.
    #[error("Failed to encode merged audio: {0}")]
    Encoding(String),

    /// Host bridge (media registry, playback element) failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// The operation was cancelled by its chapter token.
    #[error("Operation cancelled")]
    Cancelled,

    /// An operation needs a chapter but none is loaded.
    #[error("No chapter loaded")]
    NoChapter,

    /// Configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StreamError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            StreamError::Fetch(_) => true,
            StreamError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            StreamError::Fetch(_) | StreamError::HttpStatus { .. }
        )
    }

    /// Returns `true` if this error comes from decoding segment audio.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            StreamError::InvalidFormat(_)
                | StreamError::UnsupportedCodec(_)
                | StreamError::DecodingError(_)
                | StreamError::CorruptedStream(_)
                | StreamError::DecoderError(_)
        )
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
