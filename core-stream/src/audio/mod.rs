//! # Audio Primitives
//!
//! Planar sample buffers, silence synthesis and WAV encoding.

pub mod buffer;
pub mod encoder;
pub mod silence;

pub use buffer::DecodedBuffer;
pub use encoder::{encode_wav, WAV_MIME_TYPE};
pub use silence::{silence_buffer, silence_wav};
