//! # Segment Cache
//!
//! Two tiers scoped to the current chapter load:
//!
//! - **Raw**: encoded bytes as fetched (or synthesized for dividers)
//! - **Decoded**: planar sample buffers derived from the raw bytes
//!
//! Decoding is the expensive step, so the decoded tier is what keeps a
//! re-merge after a single-segment edit proportional to the edit.

mod segment_cache;
mod stats;

pub use segment_cache::SegmentCache;
pub use stats::CacheStats;
