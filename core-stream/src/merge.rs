//! # Merge Engine
//!
//! Turns a chapter into one playable buffer.
//!
//! Segments are processed strictly in chapter order. Each one comes from
//! the decoded cache when possible, otherwise it is loaded through the
//! [`SegmentLoader`] and decoded. Standard segments are followed by an
//! automatic pause unless they are last or the next segment is a divider.
//! The buffers are concatenated, encoded to WAV and returned with the
//! matching [`Timeline`].
//!
//! The engine publishes nothing itself. Attaching the output to the
//! playback element and restoring the position is the controller's job, so
//! a cancelled or failed merge leaves no trace.

use crate::audio::{encode_wav, silence_buffer, DecodedBuffer};
use crate::cache::SegmentCache;
use crate::cancel::until_cancelled;
use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::loader::SegmentLoader;
use crate::models::{Chapter, SegmentId, SegmentType};
use crate::timeline::{self, Timeline};
use crate::traits::SegmentDecoder;
use bytes::Bytes;
use core_async::sync::CancellationToken;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const DIVIDER_HINT: &str = "silence.wav";

/// Output of a completed merge.
#[derive(Debug, Clone)]
pub struct MergedAudio {
    pub buffer: Arc<DecodedBuffer>,
    /// `buffer` encoded as 16-bit WAV
    pub wav: Bytes,
    pub timeline: Timeline,
    /// Decoded duration (seconds) of every segment that produced audio
    pub durations: HashMap<SegmentId, f64>,
    /// Index of the last segment that produced audio
    pub loaded_until_index: Option<usize>,
    /// Segments decoded during this pass
    pub decoded_segments: usize,
    /// Segments served from the decoded cache
    pub cached_segments: usize,
}

impl MergedAudio {
    pub fn total_duration(&self) -> f64 {
        self.timeline.total_duration()
    }
}

/// Result of [`MergeEngine::merge`].
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    Merged(MergedAudio),
    /// No segment produced audio.
    NoAudio,
    /// The token fired before the merge finished.
    Cancelled,
}

pub struct MergeEngine {
    loader: Arc<SegmentLoader>,
    cache: Arc<SegmentCache>,
    decoder: Arc<dyn SegmentDecoder>,
    pause_ms: u64,
}

impl MergeEngine {
    pub fn new(
        loader: Arc<SegmentLoader>,
        cache: Arc<SegmentCache>,
        decoder: Arc<dyn SegmentDecoder>,
        config: &StreamConfig,
    ) -> Self {
        Self {
            loader,
            cache,
            decoder,
            pause_ms: config.pause_between_segments_ms,
        }
    }

    /// Merge every segment of `chapter`.
    ///
    /// Segments that fail to load are skipped with a zero-length boundary.
    /// A decode failure aborts the merge with the decoder's error.
    #[instrument(skip(self, chapter, cancel), fields(chapter_id = %chapter.id, segments = chapter.len()))]
    pub async fn merge(&self, chapter: &Chapter, cancel: &CancellationToken) -> Result<MergeOutcome> {
        if cancel.is_cancelled() {
            return Ok(MergeOutcome::Cancelled);
        }

        let mut buffers: Vec<Arc<DecodedBuffer>> = Vec::with_capacity(chapter.len() * 2);
        let mut durations = HashMap::new();
        let mut loaded_until_index = None;
        let mut decoded_segments = 0;
        let mut cached_segments = 0;
        let count = chapter.len();

        for (index, segment) in chapter.segments.iter().enumerate() {
            if cancel.is_cancelled() {
                debug!(index, "Merge cancelled");
                return Ok(MergeOutcome::Cancelled);
            }

            let buffer = match self.cache.get_decoded(&segment.id) {
                Some(buffer) => {
                    cached_segments += 1;
                    buffer
                }
                None => {
                    let Some(raw) = self.loader.load(segment, cancel).await else {
                        if cancel.is_cancelled() {
                            return Ok(MergeOutcome::Cancelled);
                        }
                        warn!(segment_id = %segment.id, "Skipping segment without audio");
                        continue;
                    };
                    if cancel.is_cancelled() {
                        return Ok(MergeOutcome::Cancelled);
                    }

                    let hint = match segment.segment_type {
                        SegmentType::Divider => Some(DIVIDER_HINT),
                        SegmentType::Standard => segment.audio_path(),
                    };
                    let Some(decoded) = until_cancelled(cancel, self.decoder.decode(raw, hint)).await
                    else {
                        return Ok(MergeOutcome::Cancelled);
                    };
                    let decoded = Arc::new(decoded.map_err(|e| {
                        warn!(segment_id = %segment.id, error = %e, "Segment decode failed");
                        e
                    })?);
                    if cancel.is_cancelled() {
                        return Ok(MergeOutcome::Cancelled);
                    }

                    self.cache.insert_decoded(segment.id.clone(), decoded.clone());
                    decoded_segments += 1;
                    decoded
                }
            };

            let duration = buffer.duration();
            loaded_until_index = Some(index);

            if segment.is_divider() {
                buffers.push(buffer);
                continue;
            }

            durations.insert(segment.id.clone(), duration);
            let sample_rate = buffer.sample_rate();
            let channels = buffer.channel_count();
            buffers.push(buffer);

            let next_is_divider = chapter
                .segments
                .get(index + 1)
                .is_some_and(|next| next.is_divider());
            if duration > 0.0 && index + 1 < count && !next_is_divider && self.pause_ms > 0 {
                buffers.push(Arc::new(silence_buffer(self.pause_ms, sample_rate, channels)));
            }
        }

        if buffers.is_empty() {
            info!("Chapter produced no audio");
            return Ok(MergeOutcome::NoAudio);
        }

        let joined = core_async::task::spawn_blocking(move || -> Result<(DecodedBuffer, Bytes)> {
            let merged = DecodedBuffer::concat(buffers.iter().map(|b| b.as_ref()))
                .ok_or_else(|| StreamError::Internal("Nothing to concatenate".to_string()))?;
            let wav = encode_wav(&merged)?;
            Ok((merged, wav))
        });
        let Some(joined) = until_cancelled(cancel, joined).await else {
            return Ok(MergeOutcome::Cancelled);
        };
        let (merged, wav) =
            joined.map_err(|e| StreamError::Internal(format!("Merge task failed: {}", e)))??;

        if cancel.is_cancelled() {
            return Ok(MergeOutcome::Cancelled);
        }

        let timeline = timeline::build(&durations, chapter, self.pause_ms as f64 / 1000.0);

        info!(
            total_duration = timeline.total_duration(),
            boundaries = timeline.len(),
            decoded_segments,
            cached_segments,
            bytes = wav.len(),
            "Chapter merged"
        );

        Ok(MergeOutcome::Merged(MergedAudio {
            buffer: Arc::new(merged),
            wav,
            timeline,
            durations,
            loaded_until_index,
            decoded_segments,
            cached_segments,
        }))
    }
}
