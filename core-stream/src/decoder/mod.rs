//! # Audio Decoder Module
//!
//! Segment decoding using the Symphonia library.
//!
//! Segments are small, complete files (one narrated sentence or paragraph),
//! so they are decoded whole rather than streamed:
//!
//! ```text
//! Bytes → MediaSourceStream → FormatReader → Decoder → SampleConverter → DecodedBuffer
//! ```
//!
//! Symphonia is built with all of its codecs, so MP3, AAC, FLAC, Vorbis,
//! ALAC and WAV output from any TTS engine decodes without extra features.

mod format_detector;
mod sample_converter;
mod symphonia;

pub use self::symphonia::SymphoniaDecoder;
pub use format_detector::FormatDetector;
pub use sample_converter::SampleConverter;
