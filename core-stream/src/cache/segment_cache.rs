//! Two-tier per-segment cache.

use crate::audio::DecodedBuffer;
use crate::cache::stats::CacheStats;
use crate::models::SegmentId;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct Tiers {
    raw: HashMap<SegmentId, Bytes>,
    decoded: HashMap<SegmentId, Arc<DecodedBuffer>>,
    stats: CacheStats,
}

/// Encoded bytes and decoded buffers, keyed by segment id.
///
/// A decoded entry always derives from the raw entry currently stored for
/// the same id: replacing the raw bytes drops the decoded buffer, and
/// invalidation removes both tiers together.
#[derive(Default)]
pub struct SegmentCache {
    tiers: Mutex<Tiers>,
}

impl SegmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_raw(&self, id: &SegmentId) -> Option<Bytes> {
        let mut tiers = self.tiers.lock();
        let hit = tiers.raw.get(id).cloned();
        if hit.is_some() {
            tiers.stats.raw_hits += 1;
        } else {
            tiers.stats.raw_misses += 1;
        }
        hit
    }

    pub fn contains_raw(&self, id: &SegmentId) -> bool {
        self.tiers.lock().raw.contains_key(id)
    }

    /// Store encoded bytes, discarding any decoded buffer derived from older bytes.
    pub fn insert_raw(&self, id: SegmentId, data: Bytes) {
        let mut tiers = self.tiers.lock();
        if tiers.decoded.remove(&id).is_some() {
            debug!(segment_id = %id, "Dropped stale decoded buffer");
        }
        tiers.raw.insert(id, data);
    }

    pub fn get_decoded(&self, id: &SegmentId) -> Option<Arc<DecodedBuffer>> {
        let mut tiers = self.tiers.lock();
        let hit = tiers.decoded.get(id).cloned();
        if hit.is_some() {
            tiers.stats.decoded_hits += 1;
        } else {
            tiers.stats.decoded_misses += 1;
        }
        hit
    }

    pub fn contains_decoded(&self, id: &SegmentId) -> bool {
        self.tiers.lock().decoded.contains_key(id)
    }

    pub fn insert_decoded(&self, id: SegmentId, buffer: Arc<DecodedBuffer>) {
        self.tiers.lock().decoded.insert(id, buffer);
    }

    /// Drop both tiers for one segment. Returns `true` if anything was cached.
    pub fn invalidate(&self, id: &SegmentId) -> bool {
        let mut tiers = self.tiers.lock();
        let raw = tiers.raw.remove(id).is_some();
        let decoded = tiers.decoded.remove(id).is_some();
        let removed = raw || decoded;
        if removed {
            tiers.stats.invalidations += 1;
            debug!(segment_id = %id, raw, decoded, "Invalidated cached segment");
        }
        removed
    }

    /// Drop every entry. Counters restart from zero.
    pub fn clear(&self) {
        *self.tiers.lock() = Tiers::default();
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        let tiers = self.tiers.lock();
        CacheStats {
            raw_entries: tiers.raw.len(),
            decoded_entries: tiers.decoded.len(),
            raw_bytes: tiers.raw.values().map(|b| b.len() as u64).sum(),
            decoded_frames: tiers.decoded.values().map(|b| b.frames() as u64).sum(),
            ..tiers.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(frames: usize) -> Arc<DecodedBuffer> {
        Arc::new(DecodedBuffer::zeroed(8000, 1, frames))
    }

    #[test]
    fn test_insert_and_get() {
        let cache = SegmentCache::new();
        let id = SegmentId::new("a");

        assert!(cache.get_raw(&id).is_none());
        cache.insert_raw(id.clone(), Bytes::from_static(b"wav"));
        cache.insert_decoded(id.clone(), buffer(80));

        assert_eq!(cache.get_raw(&id).unwrap(), Bytes::from_static(b"wav"));
        assert_eq!(cache.get_decoded(&id).unwrap().frames(), 80);

        let stats = cache.stats();
        assert_eq!(stats.raw_entries, 1);
        assert_eq!(stats.decoded_entries, 1);
        assert_eq!(stats.raw_bytes, 3);
        assert_eq!(stats.decoded_frames, 80);
        assert_eq!(stats.raw_hits, 1);
        assert_eq!(stats.raw_misses, 1);
    }

    #[test]
    fn test_invalidate_drops_both_tiers() {
        let cache = SegmentCache::new();
        let id = SegmentId::new("a");
        cache.insert_raw(id.clone(), Bytes::from_static(b"x"));
        cache.insert_decoded(id.clone(), buffer(10));

        assert!(cache.invalidate(&id));
        assert!(!cache.contains_raw(&id));
        assert!(!cache.contains_decoded(&id));
        assert!(!cache.invalidate(&id));
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_new_raw_bytes_drop_decoded() {
        let cache = SegmentCache::new();
        let id = SegmentId::new("a");
        cache.insert_raw(id.clone(), Bytes::from_static(b"v1"));
        cache.insert_decoded(id.clone(), buffer(10));

        cache.insert_raw(id.clone(), Bytes::from_static(b"v2"));
        assert!(!cache.contains_decoded(&id));
    }

    #[test]
    fn test_clear() {
        let cache = SegmentCache::new();
        cache.insert_raw("a".into(), Bytes::from_static(b"x"));
        cache.insert_decoded("b".into(), buffer(10));
        cache.clear();
        assert!(cache.stats().is_empty());
    }
}
