//! # Peak Extractor
//!
//! Waveform peaks per standard segment, for rendering.
//!
//! A segment's peak array has `max(min_peaks, round(duration × peaks_per_second))`
//! entries. Each entry is the largest absolute sample in its time bucket
//! across all channels. Arrays are computed whole and replaced whole.
//!
//! Loads are deduplicated per segment through an in-flight set. The
//! progressive loader walks a chapter one segment at a time so at most one
//! peak decode runs per extractor.

use crate::audio::DecodedBuffer;
use crate::cache::SegmentCache;
use crate::cancel::until_cancelled;
use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::loader::SegmentLoader;
use crate::models::{Chapter, Segment, SegmentId};
use crate::traits::SegmentDecoder;
use core_async::sync::CancellationToken;
use core_runtime::events::{CoreEvent, EventBus, WaveformEvent};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Peak array of one segment.
pub type Peaks = Arc<[f32]>;

/// Compute the peak array of `buffer`.
pub fn compute_peaks(buffer: &DecodedBuffer, peaks_per_second: u32, min_peaks: usize) -> Vec<f32> {
    let count = ((buffer.duration() * peaks_per_second as f64).round() as usize).max(min_peaks);
    let frames = buffer.frames();
    if frames == 0 || count == 0 {
        return vec![0.0; count];
    }

    (0..count)
        .map(|bucket| {
            let start = (bucket * frames / count).min(frames - 1);
            let end = ((bucket + 1) * frames / count).clamp(start + 1, frames);
            buffer
                .channels()
                .iter()
                .flat_map(|plane| plane[start..end].iter())
                .fold(0.0f32, |peak, sample| peak.max(sample.abs()))
                .min(1.0)
        })
        .collect()
}

#[derive(Default)]
struct PeakState {
    chapter: Option<Chapter>,
    peaks: HashMap<SegmentId, Peaks>,
    in_flight: HashSet<SegmentId>,
    /// Bumped on invalidation so a load started earlier cannot commit.
    generations: HashMap<SegmentId, u64>,
    epoch: u64,
    last_error: Option<String>,
}

impl PeakState {
    fn ticket(&self, id: &SegmentId) -> (u64, u64) {
        (self.epoch, self.generations.get(id).copied().unwrap_or(0))
    }
}

pub struct PeakExtractor {
    loader: Arc<SegmentLoader>,
    cache: Arc<SegmentCache>,
    decoder: Arc<dyn SegmentDecoder>,
    events: EventBus,
    peaks_per_second: u32,
    min_peaks: usize,
    state: Mutex<PeakState>,
}

impl PeakExtractor {
    pub fn new(
        loader: Arc<SegmentLoader>,
        cache: Arc<SegmentCache>,
        decoder: Arc<dyn SegmentDecoder>,
        events: EventBus,
        config: &StreamConfig,
    ) -> Self {
        Self {
            loader,
            cache,
            decoder,
            events,
            peaks_per_second: config.peaks_per_second,
            min_peaks: config.min_peaks,
            state: Mutex::new(PeakState::default()),
        }
    }

    /// Chapter used when a load names no override.
    pub fn set_chapter(&self, chapter: Chapter) {
        self.state.lock().chapter = Some(chapter);
    }

    /// Load peaks for one segment if they are not stored yet.
    ///
    /// Dividers and segments without audio are skipped. A failure is
    /// recorded in [`last_error`](Self::last_error) and reported as an event,
    /// and does not affect other segments.
    #[instrument(skip(self, chapter_override, cancel), fields(segment_id = %id))]
    pub async fn load_peaks_for_segment(
        &self,
        id: &SegmentId,
        chapter_override: Option<&Chapter>,
        cancel: &CancellationToken,
    ) {
        let (segment, ticket) = {
            let mut state = self.state.lock();
            let segment = chapter_override
                .or(state.chapter.as_ref())
                .and_then(|chapter| chapter.segment(id))
                .cloned();
            let Some(segment) = segment else {
                debug!("Segment not in chapter, skipping peaks");
                return;
            };
            if segment.is_divider() {
                return;
            }
            if segment.audio_path().is_none() {
                warn!("Segment has no audio path, skipping peaks");
                return;
            }
            if state.peaks.contains_key(id) || !state.in_flight.insert(id.clone()) {
                return;
            }
            let ticket = state.ticket(id);
            (segment, ticket)
        };

        let result = self.extract(&segment, cancel).await;

        let mut state = self.state.lock();
        if state.ticket(id) != ticket {
            debug!("Segment invalidated during peak load, discarding");
            return;
        }
        state.in_flight.remove(id);

        match result {
            Ok(None) => {}
            Ok(Some(peaks)) => {
                if state.peaks.contains_key(id) {
                    debug!("Peaks already stored, discarding duplicate");
                    return;
                }
                let peak_count = peaks.len();
                state.peaks.insert(id.clone(), peaks);
                drop(state);
                debug!(peak_count, "Peaks loaded");
                let _ = self.events.emit(CoreEvent::Waveform(WaveformEvent::PeaksLoaded {
                    segment_id: id.to_string(),
                    peak_count,
                }));
            }
            Err(e) => {
                let message = e.to_string();
                state.last_error = Some(format!("{}: {}", id, message));
                drop(state);
                warn!(error = %message, "Peak extraction failed");
                let _ = self.events.emit(CoreEvent::Waveform(WaveformEvent::PeaksFailed {
                    segment_id: id.to_string(),
                    message,
                }));
            }
        }
    }

    /// Load peaks for every segment that has audio and no stored peaks,
    /// one at a time in chapter order. Returns the number of segments
    /// that gained peaks.
    pub async fn load_missing(&self, chapter: &Chapter, cancel: &CancellationToken) -> usize {
        self.set_chapter(chapter.clone());
        let mut loaded = 0;

        for segment in &chapter.segments {
            if cancel.is_cancelled() {
                break;
            }
            if segment.is_divider() || segment.audio_path().is_none() || self.has_peaks(&segment.id) {
                continue;
            }
            self.load_peaks_for_segment(&segment.id, Some(chapter), cancel)
                .await;
            if self.has_peaks(&segment.id) {
                loaded += 1;
            }
        }

        loaded
    }

    /// Drop stored peaks for one segment.
    pub fn invalidate(&self, id: &SegmentId) {
        let removed = {
            let mut state = self.state.lock();
            *state.generations.entry(id.clone()).or_insert(0) += 1;
            state.in_flight.remove(id);
            state.peaks.remove(id).is_some()
        };
        if removed {
            let _ = self
                .events
                .emit(CoreEvent::Waveform(WaveformEvent::PeaksInvalidated {
                    segment_id: id.to_string(),
                }));
        }
    }

    /// Drop every stored peak array and the remembered chapter.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let epoch = state.epoch + 1;
        *state = PeakState {
            epoch,
            ..PeakState::default()
        };
    }

    pub fn peaks(&self) -> HashMap<SegmentId, Peaks> {
        self.state.lock().peaks.clone()
    }

    pub fn peaks_for(&self, id: &SegmentId) -> Option<Peaks> {
        self.state.lock().peaks.get(id).cloned()
    }

    pub fn has_peaks(&self, id: &SegmentId) -> bool {
        self.state.lock().peaks.contains_key(id)
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    /// Fetch, decode and reduce one segment. `Ok(None)` means there was
    /// nothing to compute (cancelled or no bytes).
    async fn extract(&self, segment: &Segment, cancel: &CancellationToken) -> Result<Option<Peaks>> {
        let buffer = match self.cache.get_decoded(&segment.id) {
            Some(buffer) => buffer,
            None => {
                let Some(raw) = self.loader.load(segment, cancel).await else {
                    if cancel.is_cancelled() {
                        return Ok(None);
                    }
                    return Err(StreamError::Fetch(format!(
                        "No audio available for segment {}",
                        segment.id
                    )));
                };
                let Some(decoded) =
                    until_cancelled(cancel, self.decoder.decode(raw, segment.audio_path())).await
                else {
                    return Ok(None);
                };
                Arc::new(decoded?)
            }
        };

        if cancel.is_cancelled() {
            return Ok(None);
        }

        let peaks_per_second = self.peaks_per_second;
        let min_peaks = self.min_peaks;
        let peaks = core_async::task::spawn_blocking(move || {
            compute_peaks(&buffer, peaks_per_second, min_peaks)
        })
        .await
        .map_err(|e| StreamError::Internal(format!("Peak task failed: {}", e)))?;

        Ok(Some(Peaks::from(peaks)))
    }
}
