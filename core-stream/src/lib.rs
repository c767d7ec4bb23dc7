//! # Segment Streaming & Merge Module
//!
//! Rebuilds one continuous chapter from independently generated audio
//! segments and keeps it playable while segments change.
//!
//! ## Overview
//!
//! This module handles:
//! - Loading segment audio over HTTP, with per-segment deduplication
//! - Synthesizing silence for divider segments and automatic pauses
//! - Decoding with symphonia and caching both encoded and decoded forms
//! - Merging into a single WAV attached to the host's playback element
//! - Timeline boundaries and waveform peaks consistent with the merge
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bridge_desktop::{HeadlessPlaybackElement, InMemoryMediaRegistry, ReqwestHttpClient};
//! use core_stream::{Chapter, Segment, StreamConfig, StreamController, SymphoniaDecoder};
//! use std::sync::Arc;
//!
//! # async fn example() -> core_stream::Result<()> {
//! let registry = Arc::new(InMemoryMediaRegistry::new());
//! let controller = StreamController::new(
//!     StreamConfig::default().with_audio_base_url("http://localhost:8765"),
//!     Arc::new(ReqwestHttpClient::new()),
//!     Arc::new(SymphoniaDecoder::new()),
//!     Arc::new(HeadlessPlaybackElement::new(registry.clone())),
//!     registry,
//! )?;
//!
//! let chapter = Chapter::new(
//!     "chapter-1",
//!     vec![
//!         Segment::standard("s1", "/api/audio/s1.wav"),
//!         Segment::divider("d1", 1500),
//!         Segment::standard("s2", "/api/audio/s2.wav"),
//!     ],
//! );
//! let state = controller.load_chapter(chapter).await?;
//! println!("{:?}, {} boundaries", state, controller.boundaries().len());
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod cache;
mod cancel;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod loader;
pub mod merge;
pub mod models;
pub mod peaks;
pub mod state;
pub mod timeline;
pub mod traits;

pub use audio::{encode_wav, silence_buffer, silence_wav, DecodedBuffer, WAV_MIME_TYPE};
pub use cache::{CacheStats, SegmentCache};
pub use config::StreamConfig;
pub use controller::StreamController;
pub use decoder::{FormatDetector, SymphoniaDecoder};
pub use error::{Result, StreamError};
pub use loader::SegmentLoader;
pub use merge::{MergeEngine, MergeOutcome, MergedAudio};
pub use models::{Chapter, ChapterId, Segment, SegmentId, SegmentStatus, SegmentType};
pub use peaks::{compute_peaks, PeakExtractor, Peaks};
pub use state::{StreamFailure, StreamSnapshot, StreamState};
pub use timeline::{Boundary, LoadState, Timeline};
pub use traits::{AudioCodec, SegmentDecoder};
