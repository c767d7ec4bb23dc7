//! Shared in-flight fetches under cancellation and wait timeouts.

mod common;

use common::{test_config, wav, FixtureHttp};
use core_async::sync::CancellationToken;
use core_async::time::{Duration, Instant};
use core_stream::{Segment, SegmentCache, SegmentLoader, StreamConfig};
use std::sync::Arc;

fn loader(config: &StreamConfig) -> (Arc<FixtureHttp>, Arc<SegmentCache>, SegmentLoader) {
    let http = FixtureHttp::new();
    let cache = Arc::new(SegmentCache::new());
    let loader = SegmentLoader::new(http.clone(), cache.clone(), config);
    (http, cache, loader)
}

#[tokio::test]
async fn joiner_survives_owner_cancellation() {
    let (http, cache, loader) = loader(&test_config());
    http.serve("/a.wav", wav(0.5, 0.5));
    http.gate("/a.wav");
    let segment = Segment::standard("a", "/a.wav");
    let owner = CancellationToken::new();
    let joiner = CancellationToken::new();

    let (first, second) = tokio::join!(loader.load(&segment, &owner), async {
        http.started().await;
        let (bytes, _) = tokio::join!(loader.load(&segment, &joiner), async {
            owner.cancel();
            http.open_gate();
        });
        bytes
    });

    assert!(first.is_none());
    assert_eq!(second, Some(wav(0.5, 0.5)));
    assert!(cache.contains_raw(&segment.id));
    assert_eq!(loader.fetch_count(), 1);
    assert_eq!(loader.pending_count(), 0);
}

#[tokio::test]
async fn fetch_is_dropped_once_every_waiter_cancels() {
    let (http, cache, loader) = loader(&test_config());
    http.serve("/a.wav", wav(0.5, 0.5));
    http.gate("/a.wav");
    let segment = Segment::standard("a", "/a.wav");
    let first_token = CancellationToken::new();
    let second_token = CancellationToken::new();

    let (first, second) = tokio::join!(loader.load(&segment, &first_token), async {
        http.started().await;
        let (bytes, _) = tokio::join!(loader.load(&segment, &second_token), async {
            first_token.cancel();
            second_token.cancel();
        });
        bytes
    });
    http.open_gate();

    assert!(first.is_none());
    assert!(second.is_none());
    assert_eq!(loader.pending_count(), 0);
    assert!(!cache.contains_raw(&segment.id));

    let retry = loader.load(&segment, &CancellationToken::new()).await;
    assert_eq!(retry, Some(wav(0.5, 0.5)));
    assert_eq!(loader.fetch_count(), 2);
}

#[tokio::test]
async fn duplicate_wait_is_bounded_while_owner_completes() {
    let config = test_config().with_inflight_wait_timeout(Duration::from_millis(50));
    let (http, cache, loader) = loader(&config);
    http.serve("/a.wav", wav(0.5, 0.5));
    http.gate("/a.wav");
    let segment = Segment::standard("a", "/a.wav");
    let token = CancellationToken::new();

    let (first, (second, waited)) = tokio::join!(loader.load(&segment, &token), async {
        http.started().await;
        let started = Instant::now();
        let bytes = loader.load(&segment, &token).await;
        let waited = started.elapsed();
        http.open_gate();
        (bytes, waited)
    });

    assert!(second.is_none());
    assert!(waited < Duration::from_secs(2), "waited {:?}", waited);
    assert_eq!(first, Some(wav(0.5, 0.5)));
    assert!(cache.contains_raw(&segment.id));
    assert_eq!(loader.fetch_count(), 1);
    assert_eq!(http.request_count(), 1);
}
