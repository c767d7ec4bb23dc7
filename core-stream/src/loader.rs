//! # Segment Loader
//!
//! Produces the encoded bytes for one segment: fetched from the audio
//! endpoint for standard segments, synthesized for dividers.
//!
//! ## Deduplication
//!
//! Concurrent loads of the same segment share one fetch. The first caller
//! registers a shared future in the pending registry; later callers clone
//! it and wait, bounded by the configured in-flight wait timeout.
//!
//! The shared fetch has its own cancellation token. A caller whose token
//! fires stops waiting without affecting the others; the fetch itself is
//! cancelled and unregistered only once every waiter has gone.
//!
//! ## Failure handling
//!
//! A failed load yields `None` and an error log, and the merge skips the
//! segment. Cancellation also yields `None` but is logged at debug only and
//! never populates the cache.

use crate::audio::silence_wav;
use crate::cache::SegmentCache;
use crate::cancel::until_cancelled;
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::models::{Segment, SegmentId, SegmentStatus};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_async::sync::CancellationToken;
use core_async::time::{timeout, Duration};
use core_runtime::logging::strip_path;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

type PendingFetch = Shared<BoxFuture<'static, Option<Bytes>>>;

struct PendingEntry {
    ticket: u64,
    cancel: CancellationToken,
    waiters: usize,
    fetch: PendingFetch,
}

type PendingRegistry = Arc<Mutex<HashMap<SegmentId, PendingEntry>>>;

/// Registration of one caller waiting on a pending fetch.
struct Waiter {
    pending: PendingRegistry,
    id: SegmentId,
    ticket: u64,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        let abandoned = {
            let mut pending = self.pending.lock();
            let last = match pending.get_mut(&self.id) {
                Some(entry) if entry.ticket == self.ticket => {
                    entry.waiters = entry.waiters.saturating_sub(1);
                    entry.waiters == 0
                }
                _ => false,
            };
            if last {
                pending.remove(&self.id)
            } else {
                None
            }
        };

        if let Some(entry) = abandoned {
            entry.cancel.cancel();
            debug!(segment_id = %self.id, "In-flight load abandoned by every waiter");
        }
    }
}

/// Loads raw segment audio through the raw cache tier.
pub struct SegmentLoader {
    http: Arc<dyn HttpClient>,
    cache: Arc<SegmentCache>,
    audio_base_url: Option<String>,
    silence_sample_rate: u32,
    silence_channels: u16,
    inflight_wait: Duration,
    fetch_timeout: Duration,
    pending: PendingRegistry,
    next_ticket: AtomicU64,
    fetch_count: Arc<AtomicU64>,
}

impl SegmentLoader {
    pub fn new(http: Arc<dyn HttpClient>, cache: Arc<SegmentCache>, config: &StreamConfig) -> Self {
        Self {
            http,
            cache,
            audio_base_url: config.audio_base_url.clone(),
            silence_sample_rate: config.silence_sample_rate,
            silence_channels: config.silence_channels,
            inflight_wait: config.inflight_wait_timeout(),
            fetch_timeout: config.fetch_timeout(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
            fetch_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Load the encoded bytes for `segment`.
    ///
    /// Returns `None` when the segment has no loadable audio, the fetch
    /// fails, the duplicate wait times out, or `cancel` fires.
    #[instrument(skip(self, segment, cancel), fields(segment_id = %segment.id))]
    pub async fn load(&self, segment: &Segment, cancel: &CancellationToken) -> Option<Bytes> {
        if cancel.is_cancelled() {
            return None;
        }

        if let Some(bytes) = self.cache.get_raw(&segment.id) {
            debug!("Raw cache hit");
            return Some(bytes);
        }

        if segment.is_divider() {
            return self.synthesize_divider(segment);
        }

        if segment.status != SegmentStatus::Completed {
            warn!(status = ?segment.status, "Segment audio not ready, skipping");
            return None;
        }

        let Some(path) = segment.audio_path() else {
            error!("{}", StreamError::MissingAudio(segment.id.to_string()));
            return None;
        };

        let url = self.resolve_url(path, segment.updated_at);
        let (fetch, _waiter, joined) = self.pending_fetch(&segment.id, url);

        if joined {
            debug!("Joining in-flight load");
            match timeout(self.inflight_wait, until_cancelled(cancel, fetch)).await {
                Ok(result) => result.flatten(),
                Err(_) => {
                    warn!(
                        wait_ms = self.inflight_wait.as_millis() as u64,
                        "Timed out waiting for in-flight load"
                    );
                    None
                }
            }
        } else {
            until_cancelled(cancel, fetch).await.flatten()
        }
    }

    /// Number of network fetches issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Number of loads currently in flight.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Detach an in-flight load so the next call fetches again.
    ///
    /// The detached fetch still completes for its current waiters but no
    /// longer writes to the cache.
    pub fn forget(&self, id: &SegmentId) {
        if self.pending.lock().remove(id).is_some() {
            debug!(segment_id = %id, "Detached in-flight load");
        }
    }

    /// Detach every in-flight load.
    pub fn forget_all(&self) {
        self.pending.lock().clear();
    }

    /// Full request URL for an audio path, with the cache-busting marker.
    pub fn resolve_url(&self, path: &str, updated_at: Option<DateTime<Utc>>) -> String {
        let mut url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            match &self.audio_base_url {
                Some(base) => format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    path.trim_start_matches('/')
                ),
                None => path.to_string(),
            }
        };

        if let Some(updated_at) = updated_at {
            let separator = if url.contains('?') { '&' } else { '?' };
            url.push(separator);
            url.push_str(&format!("v={}", updated_at.timestamp_millis()));
        }

        url
    }

    fn synthesize_divider(&self, segment: &Segment) -> Option<Bytes> {
        match silence_wav(
            segment.pause_duration,
            self.silence_sample_rate,
            self.silence_channels,
        ) {
            Ok(bytes) => {
                debug!(pause_ms = segment.pause_duration, "Synthesized divider silence");
                self.cache.insert_raw(segment.id.clone(), bytes.clone());
                Some(bytes)
            }
            Err(e) => {
                error!(error = %e, "Failed to synthesize divider silence");
                None
            }
        }
    }

    /// Return the in-flight fetch for `id`, registering a new one if none
    /// exists. The returned [`Waiter`] must be held while awaiting it.
    fn pending_fetch(&self, id: &SegmentId, url: String) -> (PendingFetch, Waiter, bool) {
        let mut pending = self.pending.lock();
        if let Some(entry) = pending.get_mut(id) {
            entry.waiters += 1;
            let waiter = Waiter {
                pending: self.pending.clone(),
                id: id.clone(),
                ticket: entry.ticket,
            };
            return (entry.fetch.clone(), waiter, true);
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let fetch = Self::fetch_task(
            self.http.clone(),
            self.cache.clone(),
            self.pending.clone(),
            self.fetch_count.clone(),
            FetchJob {
                id: id.clone(),
                url,
                ticket,
                timeout: self.fetch_timeout,
                cancel: cancel.clone(),
            },
        )
        .boxed()
        .shared();

        pending.insert(
            id.clone(),
            PendingEntry {
                ticket,
                cancel,
                waiters: 1,
                fetch: fetch.clone(),
            },
        );
        let waiter = Waiter {
            pending: self.pending.clone(),
            id: id.clone(),
            ticket,
        };
        (fetch, waiter, false)
    }

    async fn fetch_task(
        http: Arc<dyn HttpClient>,
        cache: Arc<SegmentCache>,
        pending: PendingRegistry,
        fetch_count: Arc<AtomicU64>,
        job: FetchJob,
    ) -> Option<Bytes> {
        let display_url = strip_path(&job.url).to_string();
        let request = async {
            fetch_count.fetch_add(1, Ordering::Relaxed);
            let request = HttpRequest::new(HttpMethod::Get, job.url.clone()).timeout(job.timeout);
            match http.execute(request).await {
                Ok(response) if response.is_success() => Ok(response.body),
                Ok(response) => Err(StreamError::HttpStatus {
                    status: response.status,
                    url: display_url.clone(),
                }),
                Err(e) => Err(StreamError::Fetch(e.to_string())),
            }
        };

        let outcome = until_cancelled(&job.cancel, request).await;

        let bytes = match outcome {
            None => {
                debug!(segment_id = %job.id, "Segment load cancelled");
                None
            }
            Some(Ok(bytes)) => Some(bytes),
            Some(Err(e)) => {
                error!(segment_id = %job.id, url = %display_url, error = %e, "Failed to load segment audio");
                None
            }
        };

        let mut registry = pending.lock();
        let still_registered = registry
            .get(&job.id)
            .is_some_and(|entry| entry.ticket == job.ticket);
        if still_registered {
            registry.remove(&job.id);
            if let Some(bytes) = &bytes {
                if !job.cancel.is_cancelled() {
                    cache.insert_raw(job.id.clone(), bytes.clone());
                }
            }
        }

        if job.cancel.is_cancelled() {
            return None;
        }
        bytes
    }
}

struct FetchJob {
    id: SegmentId,
    url: String,
    ticket: u64,
    timeout: Duration,
    cancel: CancellationToken,
}
