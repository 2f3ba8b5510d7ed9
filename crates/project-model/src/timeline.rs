//! Resolved timeline types.
//!
//! A [`Timeline`] is the ordered list of segments after every start and
//! duration has been computed. Starts are measured from the post-intro
//! origin. Backward jumps forced by requested starts are kept in
//! [`Timeline::overlaps`] rather than being corrected.

use serde::Serialize;

use crate::segment::Segment;

/// A segment with resolved timing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedSegment {
    /// Position in the project's segment list.
    pub index: usize,

    pub segment: Segment,

    /// Absolute start (seconds from the timeline origin).
    pub start_secs: f64,

    /// Effective duration after speed adjustment.
    pub duration_secs: f64,

    /// Whether `start_secs` came from an explicit requested start.
    pub requested: bool,
}

impl TimedSegment {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// A requested start that moved the cursor backwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlapRecord {
    pub index: usize,
    /// Where the cursor was before the jump.
    pub cursor_secs: f64,
    /// The requested start that was honored.
    pub requested_secs: f64,
}

impl OverlapRecord {
    pub fn overlap_secs(&self) -> f64 {
        self.cursor_secs - self.requested_secs
    }
}

/// Ordered, time-resolved segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timeline {
    pub entries: Vec<TimedSegment>,
    pub overlaps: Vec<OverlapRecord>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedSegment> {
        self.entries.iter()
    }

    /// Latest end time across all entries.
    pub fn end_secs(&self) -> f64 {
        self.entries
            .iter()
            .map(TimedSegment::end_secs)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SectionCard;

    fn section(index: usize, start: f64, duration: f64) -> TimedSegment {
        TimedSegment {
            index,
            segment: Segment::Section(SectionCard {
                label: format!("s{index}"),
                duration,
                sound_effect: None,
            }),
            start_secs: start,
            duration_secs: duration,
            requested: false,
        }
    }

    #[test]
    fn test_end_secs_uses_latest_end() {
        let timeline = Timeline {
            entries: vec![section(0, 0.0, 5.0), section(1, 2.0, 1.0)],
            overlaps: vec![],
        };
        assert_eq!(timeline.end_secs(), 5.0);
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn test_overlap_amount() {
        let record = OverlapRecord {
            index: 3,
            cursor_secs: 7.5,
            requested_secs: 6.0,
        };
        assert!((record.overlap_secs() - 1.5).abs() < 1e-9);
    }
}
