//! Stream lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle of the current chapter load.
///
/// `NoAudio` is terminal but not an error: the chapter has nothing to play
/// yet. `Error` means a merge broke.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum StreamState {
    #[default]
    Idle,
    Loading,
    Ready {
        /// Merged duration in seconds.
        total_duration: f64,
    },
    NoAudio,
    Error {
        message: String,
    },
}

impl StreamState {
    pub fn is_ready(&self) -> bool {
        matches!(self, StreamState::Ready { .. })
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, StreamState::Loading)
    }

    pub fn failure(&self) -> Option<StreamFailure> {
        match self {
            StreamState::NoAudio => Some(StreamFailure::NoAudio),
            StreamState::Error { message } => Some(StreamFailure::Failed(message.clone())),
            _ => None,
        }
    }
}

/// Why a chapter is not playable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum StreamFailure {
    #[serde(rename = "NO_AUDIO")]
    NoAudio,
    #[serde(rename = "FAILED")]
    Failed(String),
}

/// Flattened view of the stream for UI consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub is_ready: bool,
    pub is_loading: bool,
    pub error: Option<StreamFailure>,
    pub total_duration: f64,
    pub loaded_until_index: Option<usize>,
}

impl StreamSnapshot {
    pub fn from_state(state: &StreamState, loaded_until_index: Option<usize>) -> Self {
        let total_duration = match state {
            StreamState::Ready { total_duration } => *total_duration,
            _ => 0.0,
        };
        Self {
            is_ready: state.is_ready(),
            is_loading: state.is_loading(),
            error: state.failure(),
            total_duration,
            loaded_until_index,
        }
    }
}
