//! Timeline metadata: absolute start and effective duration per segment.
//!
//! The builder walks the segments in order with a running cursor. A
//! requested start moves the cursor (backwards too, which is recorded as an
//! overlap). Each segment then advances the cursor by its duration minus the
//! overlap allowance; section cards always advance by their full length.

use std::path::Path;

use podreel_project_model::segment::Segment;
use podreel_project_model::timeline::{OverlapRecord, TimedSegment, Timeline};

/// Supplies speech audio durations.
pub trait DurationSource {
    /// Duration of an audio file in seconds, or `None` if it cannot be read.
    fn audio_duration_secs(&self, path: &Path) -> Option<f64>;
}

impl<F> DurationSource for F
where
    F: Fn(&Path) -> Option<f64>,
{
    fn audio_duration_secs(&self, path: &Path) -> Option<f64> {
        self(path)
    }
}

/// Configuration for timeline resolution.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Speed dividing speech audio length (1 when retiming happens later).
    pub speed: f64,

    /// Seconds each segment may overlap the next.
    pub overlap_secs: f64,

    /// Backward jumps smaller than this are not reported.
    pub backward_tolerance_secs: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            overlap_secs: 0.0,
            backward_tolerance_secs: 0.01,
        }
    }
}

/// Resolves segment timing.
pub struct TimelineBuilder<'a> {
    config: TimelineConfig,
    durations: &'a dyn DurationSource,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(config: TimelineConfig, durations: &'a dyn DurationSource) -> Self {
        Self { config, durations }
    }

    fn speed(&self) -> f64 {
        let speed = self.config.speed;
        if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            1.0
        }
    }

    fn overlap(&self) -> f64 {
        let overlap = self.config.overlap_secs;
        if overlap.is_finite() {
            overlap.max(0.0)
        } else {
            0.0
        }
    }

    /// Effective duration of one segment.
    pub fn duration_of(&self, segment: &Segment) -> f64 {
        let duration = match segment {
            Segment::InsertVideo(video) => video.trim_duration(),
            Segment::Section(card) => card.duration,
            Segment::Speech(speech) => {
                let raw = speech
                    .known_duration
                    .or_else(|| self.durations.audio_duration_secs(&speech.audio));
                match raw {
                    Some(secs) if secs.is_finite() && secs >= 0.0 => secs / self.speed(),
                    _ => {
                        tracing::warn!(
                            audio = %speech.audio.display(),
                            "Could not measure speech duration, using 0"
                        );
                        0.0
                    }
                }
            }
        };
        if duration.is_finite() {
            duration.max(0.0)
        } else {
            0.0
        }
    }

    /// Resolve every segment.
    pub fn build(&self, segments: &[Segment]) -> Timeline {
        let overlap = self.overlap();
        let mut timeline = Timeline::new();
        let mut cursor = 0.0_f64;

        for (index, segment) in segments.iter().enumerate() {
            let requested = match segment.requested_start() {
                Some(start) if start.is_finite() && start >= 0.0 => Some(start),
                Some(start) => {
                    tracing::warn!(
                        index,
                        requested_secs = start,
                        "Ignoring invalid requested start"
                    );
                    None
                }
                None => None,
            };
            if let Some(start) = requested {
                if start < cursor - self.config.backward_tolerance_secs {
                    tracing::warn!(
                        index,
                        cursor_secs = cursor,
                        requested_secs = start,
                        "Requested start is before the end of the previous segment; segments will overlap"
                    );
                    timeline.overlaps.push(OverlapRecord {
                        index,
                        cursor_secs: cursor,
                        requested_secs: start,
                    });
                }
                cursor = start;
            }

            let duration = self.duration_of(segment);
            timeline.entries.push(TimedSegment {
                index,
                segment: segment.clone(),
                start_secs: cursor,
                duration_secs: duration,
                requested: requested.is_some(),
            });

            let step = match segment {
                Segment::Section(_) => duration,
                _ => (duration - overlap).max(0.0),
            };
            cursor += step;
        }

        tracing::debug!(
            segments = timeline.len(),
            overlaps = timeline.overlaps.len(),
            end_secs = timeline.end_secs(),
            "Timeline resolved"
        );
        timeline
    }
}
