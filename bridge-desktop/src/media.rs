//! In-process media registry and a headless playback element.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{MediaHandle, MediaPayload, MediaRegistry, PlaybackElement},
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Registry keeping merged payloads in memory until revoked.
#[derive(Default)]
pub struct InMemoryMediaRegistry {
    entries: Mutex<HashMap<MediaHandle, MediaPayload>>,
}

impl InMemoryMediaRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaRegistry for InMemoryMediaRegistry {
    fn create(&self, data: Bytes, mime_type: &str) -> MediaHandle {
        let handle = MediaHandle::new();
        let size = data.len();
        self.entries.lock().insert(
            handle,
            MediaPayload {
                data,
                mime_type: mime_type.to_string(),
            },
        );
        debug!(handle = %handle, size, mime_type, "Registered media payload");
        handle
    }

    fn revoke(&self, handle: &MediaHandle) -> bool {
        let removed = self.entries.lock().remove(handle).is_some();
        if removed {
            debug!(handle = %handle, "Revoked media payload");
        }
        removed
    }

    fn resolve(&self, handle: &MediaHandle) -> Option<MediaPayload> {
        self.entries.lock().get(handle).cloned()
    }

    fn live_count(&self) -> usize {
        self.entries.lock().len()
    }
}

#[derive(Debug, Default)]
struct ElementState {
    source: Option<MediaHandle>,
    current_time: f64,
    duration: Option<f64>,
    paused: bool,
}

/// Playback element without an audio device.
///
/// Loading a source reads the WAV header to learn the duration, the way a
/// browser element reports `loadedmetadata`. Useful for headless hosts and
/// for driving the stream controller in tests.
pub struct HeadlessPlaybackElement {
    registry: Arc<dyn MediaRegistry>,
    state: Mutex<ElementState>,
}

impl HeadlessPlaybackElement {
    pub fn new(registry: Arc<dyn MediaRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(ElementState {
                paused: true,
                ..ElementState::default()
            }),
        }
    }

    /// Resume playback. Fails when no source is attached.
    pub fn play(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.source.is_none() {
            return Err(BridgeError::OperationFailed(
                "No source attached".to_string(),
            ));
        }
        state.paused = false;
        Ok(())
    }

    fn probe_duration(payload: &MediaPayload) -> Result<f64> {
        let reader = hound::WavReader::new(Cursor::new(payload.data.as_ref())).map_err(|e| {
            BridgeError::OperationFailed(format!(
                "Unsupported media ({}): {}",
                payload.mime_type, e
            ))
        })?;
        let rate = reader.spec().sample_rate;
        if rate == 0 {
            return Err(BridgeError::OperationFailed(
                "Media reports a zero sample rate".to_string(),
            ));
        }
        Ok(reader.duration() as f64 / rate as f64)
    }
}

#[async_trait]
impl PlaybackElement for HeadlessPlaybackElement {
    async fn set_source(&self, source: Option<MediaHandle>) -> Result<()> {
        let duration = match &source {
            Some(handle) => {
                let payload = self
                    .registry
                    .resolve(handle)
                    .ok_or_else(|| BridgeError::UnknownMedia(handle.to_string()))?;
                Some(Self::probe_duration(&payload)?)
            }
            None => None,
        };

        let mut state = self.state.lock();
        state.source = source;
        state.duration = duration;
        state.current_time = 0.0;
        state.paused = true;
        Ok(())
    }

    fn source(&self) -> Option<MediaHandle> {
        self.state.lock().source
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn set_current_time(&self, seconds: f64) -> Result<()> {
        let mut state = self.state.lock();
        let Some(duration) = state.duration else {
            return Err(BridgeError::OperationFailed(
                "Cannot seek before metadata is loaded".to_string(),
            ));
        };
        state.current_time = seconds.clamp(0.0, duration);
        Ok(())
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, frames: usize) -> Bytes {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        Bytes::from(cursor.into_inner())
    }

    #[test]
    fn registry_create_resolve_revoke() {
        let registry = InMemoryMediaRegistry::new();
        let handle = registry.create(Bytes::from_static(b"abc"), "audio/wav");

        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.resolve(&handle).unwrap().mime_type, "audio/wav");

        assert!(registry.revoke(&handle));
        assert!(!registry.revoke(&handle));
        assert!(registry.resolve(&handle).is_none());
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn element_reads_duration_and_clamps_seek() {
        let registry = Arc::new(InMemoryMediaRegistry::new());
        let element = HeadlessPlaybackElement::new(registry.clone());
        let handle = registry.create(wav_bytes(8000, 16000), "audio/wav");

        element.set_source(Some(handle)).await.unwrap();

        assert_eq!(element.source(), Some(handle));
        assert!((element.duration().unwrap() - 2.0).abs() < 1e-9);

        element.set_current_time(1.5).unwrap();
        assert!((element.current_time() - 1.5).abs() < 1e-9);

        element.set_current_time(10.0).unwrap();
        assert!((element.current_time() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn element_rejects_revoked_handle() {
        let registry = Arc::new(InMemoryMediaRegistry::new());
        let element = HeadlessPlaybackElement::new(registry.clone());
        let handle = registry.create(wav_bytes(8000, 10), "audio/wav");
        registry.revoke(&handle);

        let result = element.set_source(Some(handle)).await;
        assert!(matches!(result, Err(BridgeError::UnknownMedia(_))));
    }

    #[tokio::test]
    async fn element_play_pause() {
        let registry = Arc::new(InMemoryMediaRegistry::new());
        let element = HeadlessPlaybackElement::new(registry.clone());
        assert!(element.play().is_err());

        let handle = registry.create(wav_bytes(8000, 10), "audio/wav");
        element.set_source(Some(handle)).await.unwrap();
        element.play().unwrap();
        assert!(!element.is_paused());

        element.pause();
        assert!(element.is_paused());

        element.set_source(None).await.unwrap();
        assert!(element.source().is_none());
        assert!(element.duration().is_none());
    }
}
