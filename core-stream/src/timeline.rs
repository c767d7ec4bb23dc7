//! # Timeline Builder
//!
//! Maps the merged output back to segments. Every standard segment and
//! divider gets one boundary, and each automatic pause gets its own
//! synthetic boundary. Boundaries are contiguous: each starts where the
//! previous one ended, and the last ends at the merged duration.

use crate::models::{Chapter, SegmentId, SegmentType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether a boundary is backed by audio in the merged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Loaded,
    /// Load or decode produced nothing; the boundary has zero length.
    Unavailable,
}

/// One entry of the merged timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boundary {
    pub segment_id: SegmentId,
    pub segment_type: SegmentType,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub is_pause: bool,
    pub is_automatic: bool,
    pub load_state: LoadState,
}

impl Boundary {
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

/// Id of the automatic pause following `id`.
pub fn automatic_pause_id(id: &SegmentId) -> SegmentId {
    SegmentId::new(format!("pause-after-{}", id))
}

/// Ordered boundary list of one merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    boundaries: Vec<Boundary>,
    total_duration: f64,
}

impl Timeline {
    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    /// End of the last boundary, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Boundary playing at `time`.
    ///
    /// Zero-length boundaries never match. The end of the timeline maps to
    /// the last non-empty boundary.
    pub fn boundary_at(&self, time: f64) -> Option<&Boundary> {
        if self.boundaries.is_empty() || time < 0.0 {
            return None;
        }

        let idx = self.boundaries.partition_point(|b| b.end <= time);
        if let Some(boundary) = self.boundaries.get(idx) {
            if boundary.contains(time) {
                return Some(boundary);
            }
        }

        if time >= self.total_duration {
            return self.boundaries.iter().rev().find(|b| b.duration > 0.0);
        }
        None
    }

    /// Position of a segment's boundary (synthetic pause ids included).
    pub fn index_of(&self, id: &SegmentId) -> Option<usize> {
        self.boundaries.iter().position(|b| &b.segment_id == id)
    }

    pub fn get(&self, id: &SegmentId) -> Option<&Boundary> {
        self.boundaries.iter().find(|b| &b.segment_id == id)
    }
}

/// Build the timeline for `chapter`.
///
/// `durations` holds the decoded duration (seconds) of every standard
/// segment that produced audio. Dividers always use their declared pause
/// length. `pause_seconds` is the automatic pause inserted after a standard
/// segment that is neither last nor followed by a divider.
pub fn build(durations: &HashMap<SegmentId, f64>, chapter: &Chapter, pause_seconds: f64) -> Timeline {
    let mut boundaries = Vec::with_capacity(chapter.segments.len() * 2);
    let mut cursor = 0.0;
    let count = chapter.segments.len();

    for (index, segment) in chapter.segments.iter().enumerate() {
        match segment.segment_type {
            SegmentType::Divider => {
                let duration = segment.pause_seconds();
                boundaries.push(Boundary {
                    segment_id: segment.id.clone(),
                    segment_type: SegmentType::Divider,
                    start: cursor,
                    end: cursor + duration,
                    duration,
                    is_pause: true,
                    is_automatic: false,
                    load_state: LoadState::Loaded,
                });
                cursor += duration;
            }
            SegmentType::Standard => {
                let duration = durations
                    .get(&segment.id)
                    .copied()
                    .filter(|d| *d > 0.0);

                let Some(duration) = duration else {
                    boundaries.push(Boundary {
                        segment_id: segment.id.clone(),
                        segment_type: SegmentType::Standard,
                        start: cursor,
                        end: cursor,
                        duration: 0.0,
                        is_pause: false,
                        is_automatic: false,
                        load_state: LoadState::Unavailable,
                    });
                    continue;
                };

                boundaries.push(Boundary {
                    segment_id: segment.id.clone(),
                    segment_type: SegmentType::Standard,
                    start: cursor,
                    end: cursor + duration,
                    duration,
                    is_pause: false,
                    is_automatic: false,
                    load_state: LoadState::Loaded,
                });
                cursor += duration;

                let next_is_divider = chapter
                    .segments
                    .get(index + 1)
                    .is_some_and(|next| next.is_divider());
                if index + 1 < count && !next_is_divider && pause_seconds > 0.0 {
                    boundaries.push(Boundary {
                        segment_id: automatic_pause_id(&segment.id),
                        segment_type: SegmentType::Divider,
                        start: cursor,
                        end: cursor + pause_seconds,
                        duration: pause_seconds,
                        is_pause: true,
                        is_automatic: true,
                        load_state: LoadState::Loaded,
                    });
                    cursor += pause_seconds;
                }
            }
        }
    }

    Timeline {
        boundaries,
        total_duration: cursor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Segment;

    const EPS: f64 = 1e-9;

    fn durations(entries: &[(&str, f64)]) -> HashMap<SegmentId, f64> {
        entries
            .iter()
            .map(|(id, d)| (SegmentId::new(*id), *d))
            .collect()
    }

    fn assert_contiguous(timeline: &Timeline) {
        let mut cursor = 0.0;
        for b in timeline.boundaries() {
            assert!((b.start - cursor).abs() < EPS, "gap before {}", b.segment_id);
            assert!((b.end - b.start - b.duration).abs() < EPS);
            cursor = b.end;
        }
        assert!((cursor - timeline.total_duration()).abs() < EPS);
    }

    #[test]
    fn test_standard_segments_with_pauses() {
        let chapter = Chapter::new(
            "ch",
            vec![
                Segment::standard("a", "a.wav"),
                Segment::standard("b", "b.wav"),
                Segment::standard("c", "c.wav"),
            ],
        );
        let timeline = build(
            &durations(&[("a", 1.0), ("b", 2.0), ("c", 1.5)]),
            &chapter,
            0.5,
        );

        assert!((timeline.total_duration() - 5.5).abs() < EPS);
        let ids: Vec<&str> = timeline
            .boundaries()
            .iter()
            .map(|b| b.segment_id.as_str())
            .collect();
        assert_eq!(ids, ["a", "pause-after-a", "b", "pause-after-b", "c"]);
        assert!(timeline.boundaries()[1].is_automatic);
        assert_contiguous(&timeline);
    }

    #[test]
    fn test_divider_suppresses_automatic_pause() {
        let chapter = Chapter::new(
            "ch",
            vec![Segment::standard("a", "a.wav"), Segment::divider("d", 2000)],
        );
        let timeline = build(&durations(&[("a", 1.0)]), &chapter, 0.5);

        assert_eq!(timeline.len(), 2);
        assert!((timeline.total_duration() - 3.0).abs() < EPS);
        let divider = &timeline.boundaries()[1];
        assert!(divider.is_pause);
        assert!(!divider.is_automatic);
        assert_contiguous(&timeline);
    }

    #[test]
    fn test_failed_segment_has_zero_length_and_no_pause() {
        let chapter = Chapter::new(
            "ch",
            vec![
                Segment::standard("a", "a.wav"),
                Segment::standard("b", "b.wav"),
                Segment::standard("c", "c.wav"),
            ],
        );
        let timeline = build(&durations(&[("a", 1.0), ("c", 1.0)]), &chapter, 0.5);

        let failed = timeline.get(&"b".into()).unwrap();
        assert_eq!(failed.start, failed.end);
        assert_eq!(failed.load_state, LoadState::Unavailable);
        assert!(timeline.get(&"pause-after-b".into()).is_none());

        let next = &timeline.boundaries()[timeline.index_of(&"b".into()).unwrap() + 1];
        assert_eq!(next.segment_id.as_str(), "c");
        assert!((timeline.total_duration() - 2.5).abs() < EPS);
        assert_contiguous(&timeline);
    }

    #[test]
    fn test_zero_pause_config() {
        let chapter = Chapter::new(
            "ch",
            vec![Segment::standard("a", "a.wav"), Segment::standard("b", "b.wav")],
        );
        let timeline = build(&durations(&[("a", 1.0), ("b", 1.0)]), &chapter, 0.0);
        assert_eq!(timeline.len(), 2);
        assert!((timeline.total_duration() - 2.0).abs() < EPS);
    }

    #[test]
    fn test_boundary_at() {
        let chapter = Chapter::new(
            "ch",
            vec![
                Segment::standard("a", "a.wav"),
                Segment::standard("x", "x.wav"),
                Segment::divider("d", 1000),
                Segment::standard("b", "b.wav"),
            ],
        );
        let timeline = build(&durations(&[("a", 1.0), ("b", 2.0)]), &chapter, 0.5);

        assert_eq!(timeline.boundary_at(0.0).unwrap().segment_id.as_str(), "a");
        assert_eq!(
            timeline.boundary_at(1.2).unwrap().segment_id.as_str(),
            "pause-after-a"
        );
        assert_eq!(timeline.boundary_at(1.5).unwrap().segment_id.as_str(), "d");
        assert_eq!(timeline.boundary_at(3.0).unwrap().segment_id.as_str(), "b");
        assert_eq!(timeline.boundary_at(4.5).unwrap().segment_id.as_str(), "b");
        assert!(timeline.boundary_at(-1.0).is_none());
    }

    #[test]
    fn test_empty_chapter() {
        let timeline = build(&HashMap::new(), &Chapter::new("ch", vec![]), 0.5);
        assert!(timeline.is_empty());
        assert_eq!(timeline.total_duration(), 0.0);
        assert!(timeline.boundary_at(0.0).is_none());
    }
}
