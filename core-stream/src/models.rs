//! # Chapter Data Models
//!
//! Segment and chapter shapes as delivered by the chapter data provider.
//! The engine reads these and never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SegmentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Chapter identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterId(String);

impl ChapterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChapterId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    /// Narrated audio fetched from the audio endpoint.
    Standard,
    /// Silence marker of a declared length.
    Divider,
}

/// Generation status reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    Pending,
    Processing,
    #[default]
    Completed,
    Failed,
}

/// One unit of chapter content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,

    pub segment_type: SegmentType,

    /// Remote audio reference, relative to the audio base URL or absolute.
    #[serde(default)]
    pub audio_path: Option<String>,

    /// Last modification, used for cache-busting.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Divider length in milliseconds.
    #[serde(default)]
    pub pause_duration: u64,

    #[serde(default)]
    pub status: SegmentStatus,
}

impl Segment {
    /// Completed standard segment pointing at `audio_path`.
    pub fn standard(id: impl Into<SegmentId>, audio_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            segment_type: SegmentType::Standard,
            audio_path: Some(audio_path.into()),
            updated_at: None,
            pause_duration: 0,
            status: SegmentStatus::Completed,
        }
    }

    /// Divider of `pause_ms` milliseconds.
    pub fn divider(id: impl Into<SegmentId>, pause_ms: u64) -> Self {
        Self {
            id: id.into(),
            segment_type: SegmentType::Divider,
            audio_path: None,
            updated_at: None,
            pause_duration: pause_ms,
            status: SegmentStatus::Completed,
        }
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn with_status(mut self, status: SegmentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_divider(&self) -> bool {
        self.segment_type == SegmentType::Divider
    }

    /// Non-empty audio reference, if any.
    pub fn audio_path(&self) -> Option<&str> {
        self.audio_path.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Whether a load can produce audio for this segment.
    ///
    /// Dividers always can. Standard segments need a completed status and a
    /// non-empty audio reference.
    pub fn has_audio(&self) -> bool {
        match self.segment_type {
            SegmentType::Divider => true,
            SegmentType::Standard => {
                self.status == SegmentStatus::Completed && self.audio_path().is_some()
            }
        }
    }

    /// Declared divider length in seconds.
    pub fn pause_seconds(&self) -> f64 {
        self.pause_duration as f64 / 1000.0
    }
}

/// Ordered sequence of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: ChapterId,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Chapter {
    pub fn new(id: impl Into<ChapterId>, segments: Vec<Segment>) -> Self {
        Self {
            id: id.into(),
            segments,
        }
    }

    pub fn segment(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| &s.id == id)
    }

    pub fn position(&self, id: &SegmentId) -> Option<usize> {
        self.segments.iter().position(|s| &s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}
