//! # Chapter Streaming Example
//!
//! Merges a small chapter served from memory, then edits one segment and
//! shows that only that segment is fetched again.
//!
//! Run with: `cargo run --example stream_demo --package core-stream -- [json|compact|pretty]`

use async_trait::async_trait;
use bridge_desktop::{HeadlessPlaybackElement, InMemoryMediaRegistry};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::logging::LogLevel;
use bridge_traits::media::PlaybackElement;
use bytes::Bytes;
use core_runtime::events::CoreEvent;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_stream::{
    encode_wav, Chapter, DecodedBuffer, Segment, StreamConfig, StreamController, SymphoniaDecoder,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tracing::info;

const BASE_URL: &str = "http://localhost:8765";
const SAMPLE_RATE: u32 = 24_000;

// ============================================================================
// In-memory audio server
// ============================================================================

/// Serves sine tones keyed by path, standing in for the audio API.
#[derive(Default)]
struct ToneServer {
    tones: Mutex<HashMap<String, Bytes>>,
}

impl ToneServer {
    fn add(&self, path: &str, seconds: f64, frequency: f64) -> core_stream::Result<()> {
        let frames = (seconds * SAMPLE_RATE as f64) as usize;
        let plane: Vec<f32> = (0..frames)
            .map(|i| {
                let t = i as f64 / SAMPLE_RATE as f64;
                ((2.0 * std::f64::consts::PI * frequency * t).sin() * 0.3) as f32
            })
            .collect();
        let wav = encode_wav(&DecodedBuffer::new(SAMPLE_RATE, vec![plane]))?;
        self.tones.lock().insert(path.to_string(), wav);
        Ok(())
    }
}

#[async_trait]
impl HttpClient for ToneServer {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let path = request
            .url
            .trim_start_matches(BASE_URL)
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        let body = self.tones.lock().get(&path).cloned();
        Ok(HttpResponse {
            status: if body.is_some() { 200 } else { 404 },
            headers: HashMap::new(),
            body: body.unwrap_or_default(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let format = match env::args().nth(1).as_deref() {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };
    init_logging(
        LoggingConfig::default()
            .with_format(format)
            .with_level(LogLevel::Debug),
    )?;

    let server = Arc::new(ToneServer::default());
    server.add("/api/audio/intro.wav", 1.5, 440.0)?;
    server.add("/api/audio/body.wav", 3.0, 330.0)?;
    server.add("/api/audio/outro.wav", 1.0, 550.0)?;

    let registry = Arc::new(InMemoryMediaRegistry::new());
    let element = Arc::new(HeadlessPlaybackElement::new(registry.clone()));
    let controller = StreamController::new(
        StreamConfig::default().with_audio_base_url(BASE_URL),
        server.clone(),
        Arc::new(SymphoniaDecoder::new()),
        element.clone(),
        registry,
    )?;

    let mut events = controller.subscribe();

    let chapter = Chapter::new(
        "chapter-1",
        vec![
            Segment::standard("intro", "/api/audio/intro.wav"),
            Segment::divider("scene-break", 2000),
            Segment::standard("body", "/api/audio/body.wav"),
            Segment::standard("outro", "/api/audio/outro.wav"),
        ],
    );

    let state = controller.load_chapter(chapter).await?;
    info!(?state, "Chapter loaded");
    for boundary in controller.boundaries() {
        println!(
            "{:>24}  {:>6.2}s - {:>6.2}s{}",
            boundary.segment_id.as_str(),
            boundary.start,
            boundary.end,
            if boundary.is_automatic { "  (pause)" } else { "" }
        );
    }

    controller.wait_for_peaks().await;
    println!("Peaks for {} segments", controller.peaks().len());

    // Seek into the body, regenerate it, and keep the position.
    element.set_current_time(5.0)?;
    server.add("/api/audio/body.wav", 2.0, 300.0)?;
    let fetches = controller.fetch_count();
    let state = controller.update_segment(&"body".into(), None).await?;
    println!(
        "After update: {:?}, {} new fetch(es), position {:.2}s",
        state,
        controller.fetch_count() - fetches,
        element.current_time()
    );

    controller.destroy().await;

    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Stream(event) = event {
            println!("event: {:?}", event);
        }
    }

    Ok(())
}
