//! # Stream Configuration
//!
//! Tunables for segment loading, pause synthesis and waveform density.

use crate::error::{Result, StreamError};
use core_async::time::Duration;
use serde::{Deserialize, Serialize};

/// Stream controller configuration.
///
/// Every field has a serde default so hosts can pass a partial JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    /// Prefix joined to relative audio paths.
    ///
    /// Absolute `http(s)://` paths are used as-is.
    ///
    /// Default: none.
    #[serde(default)]
    pub audio_base_url: Option<String>,

    /// Automatic pause inserted after a standard segment (milliseconds).
    ///
    /// `0` disables automatic pauses.
    ///
    /// Default: 500.
    #[serde(default = "default_pause_between_segments_ms")]
    pub pause_between_segments_ms: u64,

    /// Sample rate of synthesized divider silence.
    ///
    /// Default: 24000 Hz, the TTS engines' output rate.
    #[serde(default = "default_silence_sample_rate")]
    pub silence_sample_rate: u32,

    /// Channel count of synthesized divider silence.
    ///
    /// Default: 1.
    #[serde(default = "default_silence_channels")]
    pub silence_channels: u16,

    /// Waveform peak density.
    ///
    /// Default: 100 peaks per second.
    #[serde(default = "default_peaks_per_second")]
    pub peaks_per_second: u32,

    /// Lower bound on the peak count of any segment.
    ///
    /// Default: 10.
    #[serde(default = "default_min_peaks")]
    pub min_peaks: usize,

    /// How long a caller waits for a duplicate in-flight load (milliseconds).
    ///
    /// Default: 5000.
    #[serde(default = "default_inflight_wait_timeout_ms")]
    pub inflight_wait_timeout_ms: u64,

    /// Per-request HTTP timeout (milliseconds).
    ///
    /// Default: 30000.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Capacity of the controller's event bus.
    ///
    /// Default: 100.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            audio_base_url: None,
            pause_between_segments_ms: default_pause_between_segments_ms(),
            silence_sample_rate: default_silence_sample_rate(),
            silence_channels: default_silence_channels(),
            peaks_per_second: default_peaks_per_second(),
            min_peaks: default_min_peaks(),
            inflight_wait_timeout_ms: default_inflight_wait_timeout_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl StreamConfig {
    pub fn with_audio_base_url(mut self, url: impl Into<String>) -> Self {
        self.audio_base_url = Some(url.into());
        self
    }

    pub fn with_pause_between_segments_ms(mut self, ms: u64) -> Self {
        self.pause_between_segments_ms = ms;
        self
    }

    pub fn with_silence_format(mut self, sample_rate: u32, channels: u16) -> Self {
        self.silence_sample_rate = sample_rate;
        self.silence_channels = channels;
        self
    }

    pub fn with_peaks_per_second(mut self, peaks_per_second: u32) -> Self {
        self.peaks_per_second = peaks_per_second;
        self
    }

    pub fn with_inflight_wait_timeout(mut self, timeout: Duration) -> Self {
        self.inflight_wait_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Automatic pause length in seconds.
    pub fn pause_seconds(&self) -> f64 {
        self.pause_between_segments_ms as f64 / 1000.0
    }

    pub fn inflight_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.inflight_wait_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.silence_sample_rate == 0 {
            return Err(invalid("silence_sample_rate must be > 0"));
        }

        if self.silence_channels == 0 {
            return Err(invalid("silence_channels must be > 0"));
        }

        if self.peaks_per_second == 0 {
            return Err(invalid("peaks_per_second must be > 0"));
        }

        if self.min_peaks == 0 {
            return Err(invalid("min_peaks must be > 0"));
        }

        if self.inflight_wait_timeout_ms == 0 || self.fetch_timeout_ms == 0 {
            return Err(invalid("timeouts must be > 0"));
        }

        if self.event_buffer_size == 0 {
            return Err(invalid("event_buffer_size must be > 0"));
        }

        if let Some(base) = &self.audio_base_url {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(invalid("audio_base_url must be an http(s) URL"));
            }
        }

        Ok(())
    }
}

fn invalid(message: &str) -> StreamError {
    StreamError::InvalidConfig(message.to_string())
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_pause_between_segments_ms() -> u64 {
    500
}

fn default_silence_sample_rate() -> u32 {
    24_000
}

fn default_silence_channels() -> u16 {
    1
}

fn default_peaks_per_second() -> u32 {
    100
}

fn default_min_peaks() -> usize {
    10
}

fn default_inflight_wait_timeout_ms() -> u64 {
    5_000
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_event_buffer_size() -> usize {
    core_runtime::events::DEFAULT_EVENT_BUFFER_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StreamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pause_between_segments_ms, 500);
        assert_eq!(config.silence_sample_rate, 24_000);
        assert_eq!(config.peaks_per_second, 100);
        assert_eq!(config.min_peaks, 10);
        assert_eq!(config.inflight_wait_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: StreamConfig = serde_json::from_str(
            r#"{"pauseBetweenSegmentsMs": 750, "audioBaseUrl": "http://localhost:8765"}"#,
        )
        .unwrap();

        assert_eq!(config.pause_between_segments_ms, 750);
        assert_eq!(config.audio_base_url.as_deref(), Some("http://localhost:8765"));
        assert_eq!(config.silence_sample_rate, 24_000);
        assert!((config.pause_seconds() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(StreamConfig::default()
            .with_silence_format(0, 1)
            .validate()
            .is_err());
        assert!(StreamConfig::default()
            .with_peaks_per_second(0)
            .validate()
            .is_err());
        assert!(StreamConfig::default()
            .with_audio_base_url("localhost:8765")
            .validate()
            .is_err());
        assert!(StreamConfig::default()
            .with_fetch_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_zero_pause_is_allowed() {
        let config = StreamConfig::default().with_pause_between_segments_ms(0);
        assert!(config.validate().is_ok());
        assert_eq!(config.pause_seconds(), 0.0);
    }
}
