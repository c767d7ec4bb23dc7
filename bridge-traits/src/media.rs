//! Media bridge traits.
//!
//! The streaming core produces an encoded in-memory audio file after every
//! merge. Hosts expose such payloads to their audio element through a
//! transient reference (an object URL on the web, a temp registration on
//! desktop). [`MediaRegistry`] owns those references and [`PlaybackElement`]
//! is the audio element that consumes them.

use crate::error::Result;
use bytes::Bytes;
use std::fmt;
use uuid::Uuid;

/// Transient reference to an in-memory media payload.
///
/// A handle stays resolvable until it is revoked through the registry that
/// created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaHandle(Uuid);

impl MediaHandle {
    /// Generate a new handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct a handle from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// URL form of the handle, as a host audio element would see it.
    pub fn url(&self) -> String {
        format!("blob:audiobook/{}", self.0)
    }
}

impl Default for MediaHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoded payload registered behind a [`MediaHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub data: Bytes,
    pub mime_type: String,
}

/// Registry of transient media references.
pub trait MediaRegistry: Send + Sync {
    /// Register a payload and return a fresh handle to it.
    fn create(&self, data: Bytes, mime_type: &str) -> MediaHandle;

    /// Release a handle. Returns `false` when the handle was unknown or
    /// already revoked.
    fn revoke(&self, handle: &MediaHandle) -> bool;

    /// Look up the payload behind a live handle.
    fn resolve(&self, handle: &MediaHandle) -> Option<MediaPayload>;

    /// Number of live handles.
    fn live_count(&self) -> usize;
}

/// Audio element driven by the stream controller.
///
/// Times are in seconds, matching the timeline boundaries.
#[async_trait::async_trait]
pub trait PlaybackElement: Send + Sync {
    /// Point the element at a new source, or detach it with `None`.
    ///
    /// Resolves once the element has loaded metadata for the new source, so
    /// a seek issued afterwards lands in the new media.
    async fn set_source(&self, source: Option<MediaHandle>) -> Result<()>;

    /// Currently attached source.
    fn source(&self) -> Option<MediaHandle>;

    /// Current playback position.
    fn current_time(&self) -> f64;

    /// Seek to an absolute position.
    fn set_current_time(&self, seconds: f64) -> Result<()>;

    /// Duration of the loaded media, if metadata is available.
    fn duration(&self) -> Option<f64>;

    fn pause(&self);

    fn is_paused(&self) -> bool;
}
