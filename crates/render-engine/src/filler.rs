//! Silent filler clips covering timeline gaps.

use std::path::{Path, PathBuf};

use podreel_common::error::PodreelResult;
use podreel_processing_core::RenderState;
use podreel_project_model::segment::is_video_path;

use crate::clips::cover_chain;
use crate::context::RenderContext;
use crate::ffmpeg::{FfmpegInvocation, InputSpec};
use crate::graph::{num, FilterGraph};
use crate::scratch::{ClipKind, RenderedClip, TempFiles};

/// What a filler clip shows.
#[derive(Debug, Clone, PartialEq)]
pub enum GapVisual {
    Image(PathBuf),
    /// A looping video seeked to where the previous clip left it.
    Video { path: PathBuf, offset_secs: f64 },
    Black,
}

impl GapVisual {
    fn from_path(path: &Path, offset_secs: f64) -> Self {
        if is_video_path(path) {
            Self::Video {
                path: path.to_path_buf(),
                offset_secs,
            }
        } else {
            Self::Image(path.to_path_buf())
        }
    }
}

/// Pick the visual for a gap.
///
/// Priority: the still or image the last speech clip showed, the running
/// video background, the project default background, then black. Missing
/// files are skipped.
pub fn choose_gap_visual(state: &RenderState, default_background: Option<&Path>) -> GapVisual {
    if let Some(visual) = state.gap_visual.as_deref().filter(|p| p.exists()) {
        return GapVisual::from_path(visual, state.background_offset_for(Some(visual)));
    }
    if let Some(bg) = state
        .background
        .as_deref()
        .filter(|p| is_video_path(p) && p.exists())
    {
        return GapVisual::from_path(bg, state.background_offset_secs);
    }
    match default_background {
        Some(bg) if bg.exists() => GapVisual::from_path(bg, 0.0),
        Some(bg) => {
            tracing::warn!(path = %bg.display(), "Default background not found, filling gap with black");
            GapVisual::Black
        }
        None => GapVisual::Black,
    }
}

/// Render a silent clip of exactly `gap_secs`.
pub fn render_gap(
    ctx: &RenderContext<'_>,
    temps: &mut TempFiles,
    index: usize,
    gap_secs: f64,
    visual: &GapVisual,
    on_progress: &mut dyn FnMut(f64),
) -> PodreelResult<RenderedClip> {
    let duration = num(gap_secs);
    let input = match visual {
        GapVisual::Image(path) => InputSpec::file(path)
            .option("-loop", 1)
            .option("-t", &duration),
        GapVisual::Video { path, offset_secs } => InputSpec::file(path)
            .option("-stream_loop", -1)
            .option("-ss", num(*offset_secs))
            .option("-t", num(gap_secs + 1.0)),
        GapVisual::Black => InputSpec::lavfi(format!(
            "color=c=black:s={}:d={duration}:r={}",
            ctx.layout.size_arg(),
            ctx.fps()
        )),
    };

    let output = ctx.scratch.clip_path(ClipKind::Gap, index);
    temps.track(&output);

    let mut graph = FilterGraph::new();
    graph.push(cover_chain("0:v", ctx, "v"));

    let invocation = FfmpegInvocation::new("gap", &output, gap_secs)
        .input(input)
        .input(InputSpec::silence())
        .graph(graph)
        .args(["-map", "[v]", "-map", "1:a", "-t", duration.as_str(), "-shortest"])
        .args(ctx.intermediate_video_args(18))
        .args(["-s", ctx.layout.size_arg().as_str()])
        .args(ctx.intermediate_audio_args(None));
    ctx.run(&invocation, on_progress)?;

    tracing::debug!(index, gap_secs, visual = ?visual, "Gap filler rendered");
    Ok(RenderedClip {
        path: output,
        duration_secs: gap_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_when_nothing_is_known() {
        assert_eq!(choose_gap_visual(&RenderState::default(), None), GapVisual::Black);
        assert_eq!(
            choose_gap_visual(&RenderState::default(), Some(Path::new("/nope/bg.png"))),
            GapVisual::Black
        );
    }

    #[test]
    fn test_last_still_wins_over_default() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("still.png");
        let default = dir.path().join("default.png");
        std::fs::write(&still, b"png").unwrap();
        std::fs::write(&default, b"png").unwrap();

        let state = RenderState {
            gap_visual: Some(still.clone()),
            ..Default::default()
        };
        assert_eq!(
            choose_gap_visual(&state, Some(&default)),
            GapVisual::Image(still)
        );
        assert_eq!(
            choose_gap_visual(&RenderState::default(), Some(&default)),
            GapVisual::Image(default)
        );
    }

    #[test]
    fn test_running_video_background_keeps_offset() {
        let dir = tempfile::tempdir().unwrap();
        let bg = dir.path().join("loop.mp4");
        std::fs::write(&bg, b"mp4").unwrap();
        let state = RenderState {
            background: Some(bg.clone()),
            background_offset_secs: 7.5,
            ..Default::default()
        };
        assert_eq!(
            choose_gap_visual(&state, None),
            GapVisual::Video {
                path: bg,
                offset_secs: 7.5
            }
        );
    }

    #[test]
    fn test_video_background_after_image_speech() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("studio.png");
        let video = dir.path().join("loop.mp4");
        std::fs::write(&image, b"png").unwrap();
        std::fs::write(&video, b"mp4").unwrap();

        let state = RenderState::default()
            .after_speech("host", None, Some(&image), Some(image.clone()), 2.0, false)
            .after_speech("guest", None, Some(&video), None, 3.0, false)
            .after_speech("host", None, Some(&video), None, 1.5, false);
        assert_eq!(
            choose_gap_visual(&state, None),
            GapVisual::Video {
                path: video,
                offset_secs: 4.5
            }
        );
    }
}
