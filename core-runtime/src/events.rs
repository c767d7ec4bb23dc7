//! # Event Bus System
//!
//! Broadcasts typed events from the streaming core to any number of
//! subscribers (player UI, waveform renderer, diagnostics) using
//! `tokio::sync::broadcast`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐    emit     ┌───────────┐    subscribe    ┌────────────┐
//! │ Stream Controller├────────────>│           ├────────────────>│ Player UI  │
//! └──────────────────┘             │ EventBus  │                 └────────────┘
//! ┌──────────────────┐    emit     │           │    subscribe    ┌────────────┐
//! │ Peak Extractor   ├────────────>│           ├────────────────>│ Waveform   │
//! └──────────────────┘             └───────────┘                 └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, StreamEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Stream(StreamEvent::Loading {
//!         chapter_id: "ch-1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Chapter loading");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns `Err`, which publishers ignore.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Merged stream lifecycle events
    Stream(StreamEvent),
    /// Waveform peak events
    Waveform(WaveformEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Stream(e) => e.description(),
            CoreEvent::Waveform(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Stream(StreamEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Waveform(WaveformEvent::PeaksFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Stream(StreamEvent::NoAudio { .. }) => EventSeverity::Warning,
            CoreEvent::Stream(StreamEvent::Ready { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Stream Events
// ============================================================================

/// Events emitted by the stream controller as a chapter is merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum StreamEvent {
    /// A merge started for the chapter.
    Loading { chapter_id: String },
    /// The merged output is attached to the playback element.
    Ready {
        chapter_id: String,
        /// Total merged duration (milliseconds).
        total_duration_ms: u64,
        /// Number of timeline boundaries published.
        boundary_count: usize,
    },
    /// The chapter has no playable audio.
    NoAudio { chapter_id: String },
    /// The merge failed.
    Error { chapter_id: String, message: String },
    /// The controller was torn down.
    Destroyed { chapter_id: Option<String> },
}

impl StreamEvent {
    fn description(&self) -> &str {
        match self {
            StreamEvent::Loading { .. } => "Chapter loading",
            StreamEvent::Ready { .. } => "Chapter ready",
            StreamEvent::NoAudio { .. } => "Chapter has no audio",
            StreamEvent::Error { .. } => "Chapter merge failed",
            StreamEvent::Destroyed { .. } => "Stream destroyed",
        }
    }
}

// ============================================================================
// Waveform Events
// ============================================================================

/// Events emitted by the peak extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum WaveformEvent {
    /// Peaks computed and stored for a segment.
    PeaksLoaded {
        segment_id: String,
        peak_count: usize,
    },
    /// Peak extraction failed for a segment.
    PeaksFailed { segment_id: String, message: String },
    /// Stored peaks for a segment were dropped.
    PeaksInvalidated { segment_id: String },
}

impl WaveformEvent {
    fn description(&self) -> &str {
        match self {
            WaveformEvent::PeaksLoaded { .. } => "Waveform peaks loaded",
            WaveformEvent::PeaksFailed { .. } => "Waveform peaks failed",
            WaveformEvent::PeaksInvalidated { .. } => "Waveform peaks invalidated",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let waveform_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Waveform(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events that match the predicate will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
