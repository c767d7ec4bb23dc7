//! Shared fixtures for core-stream integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::{HeadlessPlaybackElement, InMemoryMediaRegistry};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_async::sync::{Notify, Semaphore};
use core_stream::{
    DecodedBuffer, Result, SegmentDecoder, SegmentId, StreamConfig, StreamController,
    SymphoniaDecoder,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BASE_URL: &str = "http://audio.test";
pub const SAMPLE_RATE: u32 = 8000;
pub const EPS: f64 = 1e-6;

/// Mono 16-bit WAV of `seconds` at [`SAMPLE_RATE`], constant `amplitude`.
pub fn wav(seconds: f64, amplitude: f32) -> Bytes {
    wav_with(SAMPLE_RATE, 1, seconds, amplitude)
}

pub fn wav_with(sample_rate: u32, channels: u16, seconds: f64, amplitude: f32) -> Bytes {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (seconds * sample_rate as f64).round() as usize;
    let value = (amplitude.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames * channels as usize {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }
    Bytes::from(cursor.into_inner())
}

/// Duration of an encoded WAV payload.
pub fn wav_duration(data: &[u8]) -> f64 {
    let reader = hound::WavReader::new(Cursor::new(data)).unwrap();
    reader.duration() as f64 / reader.spec().sample_rate as f64
}

pub fn sid(id: &str) -> SegmentId {
    SegmentId::from(id)
}

pub fn test_config() -> StreamConfig {
    StreamConfig::default()
        .with_audio_base_url(BASE_URL)
        .with_silence_format(SAMPLE_RATE, 1)
}

enum Route {
    Audio(Bytes),
    Status(u16),
}

/// In-memory audio endpoint keyed by path (query string ignored).
///
/// Gated paths block until [`open_gate`](Self::open_gate) is called and
/// signal [`started`](Self::started) when a request reaches the gate.
pub struct FixtureHttp {
    routes: Mutex<HashMap<String, Route>>,
    gated: Mutex<HashSet<String>>,
    gate: Semaphore,
    started: Notify,
    requests: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl FixtureHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            gated: Mutex::new(HashSet::new()),
            gate: Semaphore::new(0),
            started: Notify::new(),
            requests: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn serve(&self, path: &str, body: Bytes) {
        self.routes.lock().insert(path.to_string(), Route::Audio(body));
    }

    pub fn fail(&self, path: &str, status: u16) {
        self.routes.lock().insert(path.to_string(), Route::Status(status));
    }

    pub fn gate(&self, path: &str) {
        self.gated.lock().insert(path.to_string());
    }

    pub fn open_gate(&self) {
        self.gate.add_permits(1024);
    }

    /// Resolves once a request is parked at the gate.
    pub async fn started(&self) {
        self.started.notified().await;
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    fn path_of(url: &str) -> String {
        let without_query = url.split('?').next().unwrap_or(url);
        without_query
            .strip_prefix(BASE_URL)
            .unwrap_or(without_query)
            .to_string()
    }
}

#[async_trait]
impl HttpClient for FixtureHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(request.url.clone());
        let path = Self::path_of(&request.url);

        let gated = self.gated.lock().contains(&path);
        if gated {
            self.started.notify_one();
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        }

        let response = match self.routes.lock().get(&path) {
            Some(Route::Audio(body)) => HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: body.clone(),
            },
            Some(Route::Status(status)) => HttpResponse {
                status: *status,
                headers: HashMap::new(),
                body: Bytes::new(),
            },
            None => HttpResponse {
                status: 404,
                headers: HashMap::new(),
                body: Bytes::new(),
            },
        };
        Ok(response)
    }
}

/// Symphonia decoder that counts calls, keyed by the decode hint.
#[derive(Default)]
pub struct CountingDecoder {
    inner: SymphoniaDecoder,
    calls: AtomicUsize,
    per_hint: Mutex<HashMap<String, usize>>,
}

impl CountingDecoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, hint: &str) -> usize {
        self.per_hint.lock().get(hint).copied().unwrap_or(0)
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.per_hint.lock().clear();
    }
}

#[async_trait]
impl SegmentDecoder for CountingDecoder {
    async fn decode(&self, data: Bytes, hint: Option<&str>) -> Result<DecodedBuffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_hint
            .lock()
            .entry(hint.unwrap_or_default().to_string())
            .or_insert(0) += 1;
        self.inner.decode(data, hint).await
    }
}

/// Controller wired to fixtures.
pub struct Harness {
    pub controller: StreamController,
    pub http: Arc<FixtureHttp>,
    pub decoder: Arc<CountingDecoder>,
    pub registry: Arc<InMemoryMediaRegistry>,
    pub element: Arc<HeadlessPlaybackElement>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: StreamConfig) -> Self {
        let http = FixtureHttp::new();
        let decoder = CountingDecoder::new();
        let registry = Arc::new(InMemoryMediaRegistry::new());
        let element = Arc::new(HeadlessPlaybackElement::new(registry.clone()));
        let controller = StreamController::new(
            config,
            http.clone(),
            decoder.clone(),
            element.clone(),
            registry.clone(),
        )
        .unwrap();

        Self {
            controller,
            http,
            decoder,
            registry,
            element,
        }
    }
}
