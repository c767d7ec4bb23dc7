//! # Stream Controller
//!
//! Owns the playback element's source for one chapter at a time and keeps
//! it in step with chapter edits.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──load_chapter──► Loading ──► Ready
//!                          │   └───► NoAudio
//!                          └───────► Error
//! ```
//!
//! Every merge runs under a child of the chapter's cancellation token.
//! Switching chapters, destroying, or starting a newer merge cancels it,
//! and a cancelled merge publishes nothing.
//!
//! ## Publishing
//!
//! A finished merge registers its WAV with the [`MediaRegistry`], attaches
//! the handle to the [`PlaybackElement`], revokes the previous handle and
//! seeks back to the position captured before the merge (clamped to the new
//! duration). Publishing and teardown are serialized so the element never
//! ends up pointing at a revoked handle or a stale chapter.

use crate::audio::WAV_MIME_TYPE;
use crate::cache::{CacheStats, SegmentCache};
use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::loader::SegmentLoader;
use crate::merge::{MergeEngine, MergeOutcome, MergedAudio};
use crate::models::{Chapter, ChapterId, Segment, SegmentId};
use crate::peaks::{PeakExtractor, Peaks};
use crate::state::{StreamSnapshot, StreamState};
use crate::timeline::{self, Boundary, Timeline};
use crate::traits::SegmentDecoder;
use bridge_traits::http::HttpClient;
use bridge_traits::media::{MediaHandle, MediaRegistry, PlaybackElement};
use core_async::sync::{broadcast, CancellationToken, Mutex as AsyncMutex};
use core_async::task::JoinHandle;
use core_runtime::events::{CoreEvent, EventBus, StreamEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

struct Inner {
    chapter: Option<Chapter>,
    chapter_token: CancellationToken,
    merge_token: Option<CancellationToken>,
    state: StreamState,
    timeline: Timeline,
    handle: Option<MediaHandle>,
    saved_position: f64,
    loaded_until_index: Option<usize>,
    generation: u64,
    peak_task: Option<JoinHandle<()>>,
    peak_token: Option<CancellationToken>,
    destroyed: bool,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            chapter: None,
            chapter_token: CancellationToken::new(),
            merge_token: None,
            state: StreamState::Idle,
            timeline: Timeline::default(),
            handle: None,
            saved_position: 0.0,
            loaded_until_index: None,
            generation: 0,
            peak_task: None,
            peak_token: None,
            destroyed: false,
        }
    }
}

/// Orchestrates loading, merging, publishing and waveform extraction.
pub struct StreamController {
    config: StreamConfig,
    cache: Arc<SegmentCache>,
    loader: Arc<SegmentLoader>,
    engine: MergeEngine,
    peaks: Arc<PeakExtractor>,
    element: Arc<dyn PlaybackElement>,
    registry: Arc<dyn MediaRegistry>,
    events: EventBus,
    publish_lock: AsyncMutex<()>,
    inner: Mutex<Inner>,
}

impl StreamController {
    /// Create a controller.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        config: StreamConfig,
        http: Arc<dyn HttpClient>,
        decoder: Arc<dyn SegmentDecoder>,
        element: Arc<dyn PlaybackElement>,
        registry: Arc<dyn MediaRegistry>,
    ) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let cache = Arc::new(SegmentCache::new());
        let loader = Arc::new(SegmentLoader::new(http, cache.clone(), &config));
        let engine = MergeEngine::new(loader.clone(), cache.clone(), decoder.clone(), &config);
        let peaks = Arc::new(PeakExtractor::new(
            loader.clone(),
            cache.clone(),
            decoder,
            events.clone(),
            &config,
        ));

        Ok(Self {
            config,
            cache,
            loader,
            engine,
            peaks,
            element,
            registry,
            events,
            publish_lock: AsyncMutex::new(()),
            inner: Mutex::new(Inner::default()),
        })
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Load `chapter`, or re-sync with fresh data for the current one.
    ///
    /// A new chapter id tears down everything from the previous chapter
    /// first. The same id keeps caches and re-merges.
    #[instrument(skip(self, chapter), fields(chapter_id = %chapter.id))]
    pub async fn load_chapter(&self, chapter: Chapter) -> Result<StreamState> {
        let switching = {
            let inner = self.inner.lock();
            inner.chapter.as_ref().map(|c| &c.id) != Some(&chapter.id)
        };

        if switching {
            self.teardown().await;
            info!(segments = chapter.len(), "Loading chapter");
        }

        {
            let mut inner = self.inner.lock();
            if switching {
                inner.chapter_token = CancellationToken::new();
            }
            inner.chapter = Some(chapter.clone());
            inner.destroyed = false;
        }
        self.peaks.set_chapter(chapter);

        self.remerge().await
    }

    /// Append a segment to the end of the current chapter and re-merge.
    ///
    /// A segment whose id is already present replaces the existing one and
    /// is re-fetched.
    pub async fn append_segment(&self, segment: Segment) -> Result<StreamState> {
        let id = segment.id.clone();
        let replaced = {
            let mut inner = self.inner.lock();
            let chapter = inner.chapter.as_mut().ok_or(StreamError::NoChapter)?;
            match chapter.position(&id) {
                Some(pos) => {
                    chapter.segments[pos] = segment;
                    true
                }
                None => {
                    chapter.segments.push(segment);
                    false
                }
            }
        };

        if replaced {
            self.invalidate_cache(&id);
        }
        self.sync_peak_chapter();
        self.remerge().await
    }

    /// Re-fetch one segment and re-merge.
    ///
    /// Only this segment's cache entries are dropped, so every other
    /// segment is served from the decoded cache. `fresh_chapter` replaces
    /// the stored chapter data first; if its id differs from the current
    /// chapter it is loaded as a new chapter instead.
    #[instrument(skip(self, fresh_chapter), fields(segment_id = %id))]
    pub async fn update_segment(
        &self,
        id: &SegmentId,
        fresh_chapter: Option<Chapter>,
    ) -> Result<StreamState> {
        if let Some(fresh) = fresh_chapter {
            let same_chapter = {
                let mut inner = self.inner.lock();
                let same = inner.chapter.as_ref().map(|c| &c.id) == Some(&fresh.id);
                if same {
                    inner.chapter = Some(fresh.clone());
                }
                same
            };
            if !same_chapter {
                return self.load_chapter(fresh).await;
            }
            self.peaks.set_chapter(fresh);
        } else {
            let loaded = self.inner.lock().chapter.is_some();
            if !loaded {
                return Err(StreamError::NoChapter);
            }
        }

        self.invalidate_cache(id);
        self.remerge().await
    }

    /// Remove a segment from the current chapter and re-merge.
    pub async fn remove_segment(&self, id: &SegmentId) -> Result<StreamState> {
        let removed = {
            let mut inner = self.inner.lock();
            let chapter = inner.chapter.as_mut().ok_or(StreamError::NoChapter)?;
            match chapter.position(id) {
                Some(pos) => {
                    chapter.segments.remove(pos);
                    true
                }
                None => false,
            }
        };

        if !removed {
            warn!(segment_id = %id, "Segment not in chapter, nothing to remove");
            return Ok(self.state());
        }

        self.invalidate_cache(id);
        self.sync_peak_chapter();
        self.remerge().await
    }

    /// Drop both cache tiers and the peaks for one segment.
    ///
    /// Does not re-merge. Returns `true` if anything was cached.
    pub fn invalidate_cache(&self, id: &SegmentId) -> bool {
        self.loader.forget(id);
        self.peaks.invalidate(id);
        self.cache.invalidate(id)
    }

    /// Cancel the merge in flight, if any.
    ///
    /// The currently published output stays attached. The captured playback
    /// position is discarded.
    pub fn abort_pending_load(&self) {
        let mut inner = self.inner.lock();
        if let Some(token) = inner.merge_token.take() {
            token.cancel();
            inner.generation += 1;
            inner.saved_position = 0.0;
            if inner.state.is_loading() {
                inner.state = StreamState::Idle;
            }
            debug!("Aborted pending merge");
        }
    }

    /// Tear everything down: cancel loads, detach and revoke the output,
    /// clear all caches. Safe to call repeatedly.
    pub async fn destroy(&self) {
        let chapter_id = {
            let mut inner = self.inner.lock();
            if inner.destroyed {
                return;
            }
            inner.destroyed = true;
            inner.chapter.as_ref().map(|c| c.id.to_string())
        };

        self.teardown().await;
        info!(chapter_id = ?chapter_id, "Stream destroyed");
        self.emit(StreamEvent::Destroyed { chapter_id });
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> StreamState {
        self.inner.lock().state.clone()
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        let inner = self.inner.lock();
        StreamSnapshot::from_state(&inner.state, inner.loaded_until_index)
    }

    pub fn timeline(&self) -> Timeline {
        self.inner.lock().timeline.clone()
    }

    pub fn boundaries(&self) -> Vec<Boundary> {
        self.inner.lock().timeline.boundaries().to_vec()
    }

    pub fn peaks(&self) -> HashMap<SegmentId, Peaks> {
        self.peaks.peaks()
    }

    /// Last per-segment peak extraction failure.
    pub fn peak_error(&self) -> Option<String> {
        self.peaks.last_error()
    }

    pub fn chapter_id(&self) -> Option<ChapterId> {
        self.inner.lock().chapter.as_ref().map(|c| c.id.clone())
    }

    pub fn chapter(&self) -> Option<Chapter> {
        self.inner.lock().chapter.clone()
    }

    /// Handle of the published merged output.
    pub fn current_media(&self) -> Option<MediaHandle> {
        self.inner.lock().handle
    }

    /// Position captured for the merge in flight.
    pub fn saved_position(&self) -> f64 {
        self.inner.lock().saved_position
    }

    pub fn element(&self) -> Arc<dyn PlaybackElement> {
        self.element.clone()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Network fetches issued since creation.
    pub fn fetch_count(&self) -> u64 {
        self.loader.fetch_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Wait for the progressive peak loading started by the last merge.
    pub async fn wait_for_peaks(&self) {
        let task = self.inner.lock().peak_task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Peak loading task failed");
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    #[instrument(skip(self))]
    async fn remerge(&self) -> Result<StreamState> {
        let (chapter, token, generation) = {
            let mut inner = self.inner.lock();
            let chapter = inner.chapter.clone().ok_or(StreamError::NoChapter)?;
            if let Some(previous) = inner.merge_token.take() {
                previous.cancel();
            }
            let token = inner.chapter_token.child_token();
            inner.merge_token = Some(token.clone());
            inner.generation += 1;
            inner.saved_position = if self.element.source().is_some() {
                self.element.current_time()
            } else {
                0.0
            };
            inner.state = StreamState::Loading;
            (chapter, token, inner.generation)
        };
        self.element.pause();

        let chapter_id = chapter.id.to_string();
        self.emit(StreamEvent::Loading {
            chapter_id: chapter_id.clone(),
        });

        let outcome = self.engine.merge(&chapter, &token).await;

        if token.is_cancelled() || !self.is_current(generation) {
            debug!(generation, "Discarding superseded merge");
            return Ok(self.state());
        }

        match outcome {
            Ok(MergeOutcome::Merged(audio)) => {
                self.publish(&chapter, audio, &token, generation).await
            }
            Ok(MergeOutcome::NoAudio) => {
                self.publish_no_audio(&chapter, generation).await;
                Ok(self.state())
            }
            Ok(MergeOutcome::Cancelled) => Ok(self.state()),
            Err(e) => {
                error!(chapter_id = %chapter_id, error = %e, "Chapter merge failed");
                let message = e.to_string();
                if self.finish(generation, StreamState::Error {
                    message: message.clone(),
                }) {
                    self.emit(StreamEvent::Error {
                        chapter_id,
                        message,
                    });
                }
                Ok(self.state())
            }
        }
    }

    async fn publish(
        &self,
        chapter: &Chapter,
        audio: MergedAudio,
        token: &CancellationToken,
        generation: u64,
    ) -> Result<StreamState> {
        let _guard = self.publish_lock.lock().await;
        if token.is_cancelled() || !self.is_current(generation) {
            return Ok(self.state());
        }

        let handle = self.registry.create(audio.wav.clone(), WAV_MIME_TYPE);
        if let Err(e) = self.element.set_source(Some(handle)).await {
            self.registry.revoke(&handle);
            let err = StreamError::from(e);
            error!(error = %err, "Failed to attach merged output");
            let message = err.to_string();
            if self.finish(generation, StreamState::Error {
                message: message.clone(),
            }) {
                self.emit(StreamEvent::Error {
                    chapter_id: chapter.id.to_string(),
                    message,
                });
            }
            return Ok(self.state());
        }

        let total_duration = audio.total_duration();
        let committed = {
            let mut inner = self.inner.lock();
            if token.is_cancelled() || inner.generation != generation {
                Err(inner.handle)
            } else {
                let previous = inner.handle.replace(handle);
                let position = inner.saved_position;
                inner.saved_position = 0.0;
                inner.timeline = audio.timeline.clone();
                inner.loaded_until_index = audio.loaded_until_index;
                inner.state = StreamState::Ready { total_duration };
                inner.merge_token = None;
                Ok((previous, position))
            }
        };

        let (previous, position) = match committed {
            Ok(committed) => committed,
            Err(current) => {
                // Superseded while attaching: put the published source back.
                if let Err(e) = self.element.set_source(current).await {
                    warn!(error = %e, "Failed to restore previous source");
                }
                self.registry.revoke(&handle);
                return Ok(self.state());
            }
        };

        if let Some(previous) = previous {
            self.registry.revoke(&previous);
        }

        let target = position.clamp(0.0, total_duration);
        if target > 0.0 {
            if let Err(e) = self.element.set_current_time(target) {
                warn!(error = %e, position = target, "Failed to restore playback position");
            }
        }

        info!(
            chapter_id = %chapter.id,
            total_duration,
            restored_position = target,
            "Merged output published"
        );
        self.emit(StreamEvent::Ready {
            chapter_id: chapter.id.to_string(),
            total_duration_ms: (total_duration * 1000.0).round() as u64,
            boundary_count: audio.timeline.len(),
        });

        self.spawn_peak_loading(chapter.clone());
        Ok(self.state())
    }

    async fn publish_no_audio(&self, chapter: &Chapter, generation: u64) {
        let _guard = self.publish_lock.lock().await;
        let previous = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            inner.state = StreamState::NoAudio;
            inner.timeline = timeline::build(
                &HashMap::new(),
                chapter,
                self.config.pause_seconds(),
            );
            inner.loaded_until_index = None;
            inner.saved_position = 0.0;
            inner.merge_token = None;
            inner.handle.take()
        };

        if let Some(previous) = previous {
            if let Err(e) = self.element.set_source(None).await {
                warn!(error = %e, "Failed to detach previous output");
            }
            self.registry.revoke(&previous);
        }

        info!(chapter_id = %chapter.id, "Chapter has no playable audio");
        self.emit(StreamEvent::NoAudio {
            chapter_id: chapter.id.to_string(),
        });
    }

    /// Record a terminal state if `generation` is still current.
    fn finish(&self, generation: u64, state: StreamState) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        inner.state = state;
        inner.merge_token = None;
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().generation == generation
    }

    async fn teardown(&self) {
        let previous = {
            let mut inner = self.inner.lock();
            inner.chapter_token.cancel();
            if let Some(token) = inner.merge_token.take() {
                token.cancel();
            }
            inner.generation += 1;
            inner.chapter = None;
            inner.state = StreamState::Idle;
            inner.timeline = Timeline::default();
            inner.saved_position = 0.0;
            inner.loaded_until_index = None;
            inner.peak_task = None;
            if let Some(token) = inner.peak_token.take() {
                token.cancel();
            }
            inner.handle.take()
        };

        self.loader.forget_all();
        self.cache.clear();
        self.peaks.clear();

        let _guard = self.publish_lock.lock().await;
        self.element.pause();
        if self.element.source().is_some() {
            if let Err(e) = self.element.set_source(None).await {
                warn!(error = %e, "Failed to detach output during teardown");
            }
        }
        if let Some(previous) = previous {
            self.registry.revoke(&previous);
        }
        debug!("Chapter state torn down");
    }

    fn sync_peak_chapter(&self) {
        if let Some(chapter) = self.chapter() {
            self.peaks.set_chapter(chapter);
        }
    }

    /// Start peak loading for the published chapter. A run still going from
    /// an earlier publish is cancelled and awaited first, so at most one
    /// run is active.
    fn spawn_peak_loading(&self, chapter: Chapter) {
        let peaks = self.peaks.clone();
        let mut inner = self.inner.lock();
        if let Some(previous) = inner.peak_token.take() {
            previous.cancel();
        }
        let previous_task = inner.peak_task.take();
        let token = inner.chapter_token.child_token();
        inner.peak_token = Some(token.clone());

        let task = core_async::spawn(async move {
            if let Some(previous_task) = previous_task {
                if let Err(e) = previous_task.await {
                    warn!(error = %e, "Previous peak loading task failed");
                }
            }
            let loaded = peaks.load_missing(&chapter, &token).await;
            debug!(loaded, "Progressive peak loading finished");
        });
        inner.peak_task = Some(task);
    }

    fn emit(&self, event: StreamEvent) {
        let _ = self.events.emit(CoreEvent::Stream(event));
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.destroyed {
            return;
        }
        inner.chapter_token.cancel();
        if let Some(token) = inner.merge_token.take() {
            token.cancel();
        }
        self.element.pause();
        if let Some(handle) = inner.handle.take() {
            self.registry.revoke(&handle);
        }
        self.loader.forget_all();
        self.cache.clear();
        self.peaks.clear();
    }
}
