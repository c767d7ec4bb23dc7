//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Statistics about the two-tier segment cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Segments with cached encoded bytes
    pub raw_entries: usize,

    /// Segments with a cached decoded buffer
    pub decoded_entries: usize,

    /// Total encoded bytes held
    pub raw_bytes: u64,

    /// Total decoded frames held, summed over segments
    pub decoded_frames: u64,

    pub raw_hits: u64,
    pub raw_misses: u64,
    pub decoded_hits: u64,
    pub decoded_misses: u64,

    /// Entries dropped by explicit invalidation
    pub invalidations: u64,
}

impl CacheStats {
    /// Decoded-tier hit rate in `[0.0, 1.0]`.
    pub fn decoded_hit_rate(&self) -> f64 {
        hit_rate(self.decoded_hits, self.decoded_misses)
    }

    /// Raw-tier hit rate in `[0.0, 1.0]`.
    pub fn raw_hit_rate(&self) -> f64 {
        hit_rate(self.raw_hits, self.raw_misses)
    }

    pub fn is_empty(&self) -> bool {
        self.raw_entries == 0 && self.decoded_entries == 0
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    hits as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rates() {
        let stats = CacheStats {
            decoded_hits: 3,
            decoded_misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.decoded_hit_rate(), 0.75);
        assert_eq!(stats.raw_hit_rate(), 0.0);
        assert!(stats.is_empty());
    }
}
