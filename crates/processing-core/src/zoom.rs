//! Continuity state threaded through the segment fold.
//!
//! Zoom continues from where the previous clip ended only when the same
//! speaker talks again and the previous clip was itself zooming; any other
//! transition starts again at 1.0. The background cursor tracks how far into
//! a looping background video the next clip should seek.

use std::path::{Path, PathBuf};

/// Zoom growth parameters.
#[derive(Debug, Clone, Copy)]
pub struct ZoomConfig {
    /// Zoom added per output frame.
    pub step_per_frame: f64,
    /// Ceiling for the zoom factor.
    pub max_zoom: f64,
    /// Output frame rate.
    pub fps: u32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            step_per_frame: 0.0005,
            max_zoom: 2.0,
            fps: 30,
        }
    }
}

impl ZoomConfig {
    /// Frames covering `duration_secs` at the configured rate.
    pub fn frames_for(&self, duration_secs: f64) -> u64 {
        if duration_secs.is_finite() && duration_secs > 0.0 {
            (duration_secs * self.fps as f64).ceil() as u64
        } else {
            0
        }
    }

    /// Zoom reached after `duration_secs` starting from `start`.
    pub fn end_zoom(&self, start: f64, duration_secs: f64) -> f64 {
        let grown = start + self.frames_for(duration_secs) as f64 * self.step_per_frame;
        grown.min(self.max_zoom)
    }
}

/// Continuity carried from one rendered clip to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    /// Zoom factor the previous clip ended on (>= 1).
    pub current_zoom: f64,

    pub last_speaker: Option<String>,

    /// Whether the previous clip zoomed.
    pub last_was_zoom: bool,

    /// Secondary background of the previous speech clip.
    pub background: Option<PathBuf>,

    /// Seek position into `background` when it is a video.
    pub background_offset_secs: f64,

    /// Visual to reuse for gap filler clips.
    pub gap_visual: Option<PathBuf>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            current_zoom: 1.0,
            last_speaker: None,
            last_was_zoom: false,
            background: None,
            background_offset_secs: 0.0,
            gap_visual: None,
        }
    }
}

impl RenderState {
    /// Starting zoom for a clip by `speaker`.
    pub fn zoom_start_for(&self, speaker: &str, wants_zoom: bool) -> f64 {
        let continuous = wants_zoom
            && self.last_was_zoom
            && self.last_speaker.as_deref() == Some(speaker);
        if continuous {
            self.current_zoom.max(1.0)
        } else {
            1.0
        }
    }

    /// Seek offset into `background` for the next clip.
    ///
    /// The offset only carries over while the background stays the same.
    pub fn background_offset_for(&self, background: Option<&Path>) -> f64 {
        match background {
            Some(bg) if self.background.as_deref() == Some(bg) => self.background_offset_secs,
            _ => 0.0,
        }
    }

    /// State after a speech clip.
    ///
    /// `end_zoom` is `None` when the clip did not zoom. Static clips (echo
    /// stills) do not advance the background cursor. `gap_visual` replaces
    /// whatever an earlier clip left behind, including with `None`.
    pub fn after_speech(
        self,
        speaker: &str,
        end_zoom: Option<f64>,
        background: Option<&Path>,
        gap_visual: Option<PathBuf>,
        clip_secs: f64,
        is_static: bool,
    ) -> Self {
        let mut offset = self.background_offset_for(background);
        if !is_static {
            offset += clip_secs.max(0.0);
        }
        Self {
            current_zoom: end_zoom.unwrap_or(1.0),
            last_speaker: Some(speaker.to_string()),
            last_was_zoom: end_zoom.is_some(),
            background: background.map(Path::to_path_buf),
            background_offset_secs: offset,
            gap_visual,
        }
    }

    /// State after a clip that is not a speech turn (insert, section, gap).
    ///
    /// Zoom resets; the background video keeps running underneath.
    pub fn after_other(self, clip_secs: f64) -> Self {
        Self {
            current_zoom: 1.0,
            last_speaker: None,
            last_was_zoom: false,
            background_offset_secs: self.background_offset_secs + clip_secs.max(0.0),
            ..self
        }
    }

    /// State after a gap filler. Zoom continuity is preserved across gaps.
    pub fn after_gap(self, gap_secs: f64) -> Self {
        Self {
            background_offset_secs: self.background_offset_secs + gap_secs.max(0.0),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_zoom_growth_and_cap() {
        let zoom = ZoomConfig::default();
        assert_eq!(zoom.frames_for(2.0), 60);
        assert!((zoom.end_zoom(1.0, 2.0) - 1.03).abs() < 1e-9);
        assert_eq!(zoom.end_zoom(1.99, 10.0), 2.0);
        assert_eq!(zoom.end_zoom(1.2, 0.0), 1.2);
    }

    #[test]
    fn test_zoom_continues_for_same_speaker() {
        let state = RenderState::default().after_speech("host", Some(1.03), None, None, 2.0, false);
        assert_eq!(state.zoom_start_for("host", true), 1.03);
    }

    #[test]
    fn test_zoom_resets_on_speaker_change() {
        let state = RenderState::default().after_speech("host", Some(1.03), None, None, 2.0, false);
        assert_eq!(state.zoom_start_for("guest", true), 1.0);
    }

    #[test]
    fn test_zoom_resets_after_non_zoom_clip() {
        let state = RenderState::default()
            .after_speech("host", Some(1.03), None, None, 2.0, false)
            .after_speech("host", None, None, None, 2.0, false);
        assert_eq!(state.zoom_start_for("host", true), 1.0);
    }

    #[test]
    fn test_zoom_resets_after_insert() {
        let state = RenderState::default()
            .after_speech("host", Some(1.03), None, None, 2.0, false)
            .after_other(3.0);
        assert_eq!(state.zoom_start_for("host", true), 1.0);
    }

    #[test]
    fn test_zoom_survives_gap() {
        let state = RenderState::default()
            .after_speech("host", Some(1.03), None, None, 2.0, false)
            .after_gap(1.0);
        assert_eq!(state.zoom_start_for("host", true), 1.03);
    }

    #[test]
    fn test_non_zoom_clip_starts_at_one() {
        let state = RenderState::default().after_speech("host", Some(1.5), None, None, 2.0, false);
        assert_eq!(state.zoom_start_for("host", false), 1.0);
    }

    #[test]
    fn test_background_offset_tracks_same_background() {
        let bg = Path::new("bg/loop.mp4");
        let state = RenderState::default().after_speech("host", None, Some(bg), None, 2.0, false);
        assert_eq!(state.background_offset_for(Some(bg)), 2.0);

        let state = state.after_gap(0.5);
        assert_eq!(state.background_offset_for(Some(bg)), 2.5);

        let state = state.after_speech("host", None, Some(bg), None, 1.0, true);
        assert_eq!(state.background_offset_for(Some(bg)), 2.5);
    }

    #[test]
    fn test_background_offset_resets_on_change() {
        let a = Path::new("bg/a.mp4");
        let b = Path::new("bg/b.mp4");
        let state = RenderState::default().after_speech("host", None, Some(a), None, 4.0, false);
        assert_eq!(state.background_offset_for(Some(b)), 0.0);

        let state = state.after_speech("host", None, Some(b), None, 1.0, false);
        assert_eq!(state.background_offset_secs, 1.0);
    }

    #[test]
    fn test_gap_visual_follows_latest_speech() {
        let state = RenderState::default().after_speech(
            "host",
            None,
            None,
            Some(PathBuf::from("still.png")),
            1.0,
            false,
        );
        let state = state.after_gap(0.5);
        assert_eq!(state.gap_visual, Some(PathBuf::from("still.png")));

        let bg = Path::new("bg/loop.mp4");
        let state = state.after_speech("host", None, Some(bg), None, 1.0, false);
        assert_eq!(state.gap_visual, None);
    }
}
