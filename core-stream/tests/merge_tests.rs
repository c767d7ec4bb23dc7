//! Merge engine behaviour against fixture audio.

mod common;

use common::{test_config, wav, wav_duration, CountingDecoder, FixtureHttp, EPS};
use core_async::sync::CancellationToken;
use core_stream::{
    Chapter, LoadState, MergeEngine, MergeOutcome, MergedAudio, Segment, SegmentCache,
    SegmentLoader, StreamConfig,
};
use std::sync::Arc;

struct Fixture {
    engine: MergeEngine,
    cache: Arc<SegmentCache>,
    http: Arc<FixtureHttp>,
    decoder: Arc<CountingDecoder>,
}

fn fixture(config: StreamConfig) -> Fixture {
    let http = FixtureHttp::new();
    let decoder = CountingDecoder::new();
    let cache = Arc::new(SegmentCache::new());
    let loader = Arc::new(SegmentLoader::new(http.clone(), cache.clone(), &config));
    let engine = MergeEngine::new(loader, cache.clone(), decoder.clone(), &config);
    Fixture {
        engine,
        cache,
        http,
        decoder,
    }
}

async fn merged(fixture: &Fixture, chapter: &Chapter) -> MergedAudio {
    match fixture
        .engine
        .merge(chapter, &CancellationToken::new())
        .await
        .unwrap()
    {
        MergeOutcome::Merged(audio) => audio,
        other => panic!("expected merged output, got {:?}", other),
    }
}

#[tokio::test]
async fn total_duration_is_sum_of_segments_plus_pauses() {
    let f = fixture(test_config());
    f.http.serve("/a.wav", wav(1.0, 0.5));
    f.http.serve("/b.wav", wav(2.0, 0.5));
    f.http.serve("/c.wav", wav(0.5, 0.5));

    let chapter = Chapter::new(
        "ch",
        vec![
            Segment::standard("a", "/a.wav"),
            Segment::standard("b", "/b.wav"),
            Segment::standard("c", "/c.wav"),
        ],
    );
    let audio = merged(&f, &chapter).await;

    // 1.0 + 2.0 + 0.5 + 2 × 0.5
    let expected = 4.5;
    assert!((audio.total_duration() - expected).abs() < EPS);
    assert!((audio.buffer.duration() - expected).abs() < EPS);
    assert!((wav_duration(&audio.wav) - expected).abs() < EPS);
    assert_eq!(audio.timeline.len(), 5);
    assert_eq!(audio.loaded_until_index, Some(2));
}

#[tokio::test]
async fn divider_replaces_automatic_pause() {
    let f = fixture(test_config());
    f.http.serve("/a.wav", wav(1.0, 0.5));

    let chapter = Chapter::new(
        "ch",
        vec![Segment::standard("a", "/a.wav"), Segment::divider("d", 1500)],
    );
    let audio = merged(&f, &chapter).await;

    assert!((audio.total_duration() - 2.5).abs() < EPS);
    assert!((audio.buffer.duration() - 2.5).abs() < EPS);
    assert!(audio
        .timeline
        .boundaries()
        .iter()
        .all(|b| !b.is_automatic));
    assert_eq!(f.http.request_count(), 1);
}

#[tokio::test]
async fn failed_segment_is_zero_length_without_trailing_pause() {
    let f = fixture(test_config());
    f.http.serve("/a.wav", wav(1.0, 0.5));
    f.http.fail("/b.wav", 500);
    f.http.serve("/c.wav", wav(1.0, 0.5));

    let chapter = Chapter::new(
        "ch",
        vec![
            Segment::standard("a", "/a.wav"),
            Segment::standard("b", "/b.wav"),
            Segment::standard("c", "/c.wav"),
        ],
    );
    let audio = merged(&f, &chapter).await;
    let timeline = &audio.timeline;

    let b = timeline.get(&"b".into()).unwrap();
    assert_eq!(b.start, b.end);
    assert_eq!(b.load_state, LoadState::Unavailable);
    assert!(timeline.get(&"pause-after-b".into()).is_none());

    let b_index = timeline.index_of(&"b".into()).unwrap();
    assert_eq!(timeline.boundaries()[b_index + 1].segment_id.as_str(), "c");

    // a + pause + c
    assert!((audio.total_duration() - 2.5).abs() < EPS);
    assert!((audio.buffer.duration() - 2.5).abs() < EPS);
}

#[tokio::test]
async fn repeated_merge_yields_equal_boundaries_from_cache() {
    let f = fixture(test_config());
    f.http.serve("/a.wav", wav(1.0, 0.5));
    f.http.serve("/b.wav", wav(0.75, 0.5));

    let chapter = Chapter::new(
        "ch",
        vec![
            Segment::standard("a", "/a.wav"),
            Segment::divider("d", 250),
            Segment::standard("b", "/b.wav"),
        ],
    );

    let first = merged(&f, &chapter).await;
    let decodes_after_first = f.decoder.calls();
    let second = merged(&f, &chapter).await;

    assert_eq!(first.timeline.boundaries(), second.timeline.boundaries());
    assert_eq!(decodes_after_first, 3);
    assert_eq!(f.decoder.calls(), 3);
    assert_eq!(second.cached_segments, 3);
    assert_eq!(second.decoded_segments, 0);
    assert_eq!(f.http.request_count(), 2);
}

#[tokio::test]
async fn all_segments_failing_is_no_audio() {
    let f = fixture(test_config());
    f.http.fail("/a.wav", 404);

    let chapter = Chapter::new(
        "ch",
        vec![
            Segment::standard("a", "/a.wav"),
            Segment::standard("b", "/missing.wav"),
            Segment::standard("c", ""),
        ],
    );
    let outcome = f
        .engine
        .merge(&chapter, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, MergeOutcome::NoAudio));
    assert!(f.cache.stats().is_empty());
}

#[tokio::test]
async fn corrupt_audio_fails_the_merge() {
    let f = fixture(test_config());
    f.http.serve("/a.wav", wav(1.0, 0.5));
    f.http
        .serve("/b.mp3", bytes::Bytes::from_static(b"definitely not audio"));

    let chapter = Chapter::new(
        "ch",
        vec![
            Segment::standard("a", "/a.wav"),
            Segment::standard("b", "/b.mp3"),
        ],
    );
    let err = f
        .engine
        .merge(&chapter, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_decode_error(), "unexpected error: {err}");
}

#[tokio::test]
async fn cancelled_before_start_touches_nothing() {
    let f = fixture(test_config());
    f.http.serve("/a.wav", wav(1.0, 0.5));
    let token = CancellationToken::new();
    token.cancel();

    let chapter = Chapter::new("ch", vec![Segment::standard("a", "/a.wav")]);
    let outcome = f.engine.merge(&chapter, &token).await.unwrap();

    assert!(matches!(outcome, MergeOutcome::Cancelled));
    assert_eq!(f.http.request_count(), 0);
    assert!(f.cache.stats().is_empty());
}

#[tokio::test]
async fn cancelled_mid_fetch_does_not_populate_cache() {
    let f = fixture(test_config());
    f.http.serve("/a.wav", wav(1.0, 0.5));
    f.http.serve("/b.wav", wav(1.0, 0.5));
    f.http.gate("/b.wav");

    let chapter = Chapter::new(
        "ch",
        vec![
            Segment::standard("a", "/a.wav"),
            Segment::standard("b", "/b.wav"),
        ],
    );
    let token = CancellationToken::new();

    let (outcome, _) = tokio::join!(f.engine.merge(&chapter, &token), async {
        f.http.started().await;
        token.cancel();
        f.http.open_gate();
    });

    assert!(matches!(outcome.unwrap(), MergeOutcome::Cancelled));
    assert!(f.cache.contains_decoded(&"a".into()));
    assert!(!f.cache.contains_raw(&"b".into()));
    assert!(!f.cache.contains_decoded(&"b".into()));
}

#[tokio::test]
async fn mixed_sample_rates_are_converted_to_the_first() {
    let f = fixture(test_config().with_pause_between_segments_ms(0));
    f.http.serve("/a.wav", wav(1.0, 0.5));
    f.http.serve("/b.wav", common::wav_with(16000, 2, 1.0, 0.25));

    let chapter = Chapter::new(
        "ch",
        vec![
            Segment::standard("a", "/a.wav"),
            Segment::standard("b", "/b.wav"),
        ],
    );
    let audio = merged(&f, &chapter).await;

    assert_eq!(audio.buffer.sample_rate(), common::SAMPLE_RATE);
    assert_eq!(audio.buffer.channel_count(), 1);
    assert!((audio.buffer.duration() - 2.0).abs() < EPS);
    assert!((audio.total_duration() - 2.0).abs() < EPS);
}
