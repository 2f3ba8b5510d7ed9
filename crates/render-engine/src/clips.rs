//! Section cards, inserted videos, the intro, and still-frame extraction.

use std::path::{Path, PathBuf};

use podreel_captions::wrap::wrap_text;
use podreel_common::error::{PodreelError, PodreelResult};
use podreel_project_model::segment::{is_video_path, InsertedVideo, Language, SectionCard};

use crate::compositor::{cover_filters, title_card_chain};
use crate::context::RenderContext;
use crate::ffmpeg::{FfmpegInvocation, InputSpec};
use crate::graph::{num, Filter, FilterChain, FilterGraph};
use crate::scratch::{ClipKind, RenderedClip, TempFiles};

/// Font size of section card labels.
pub const SECTION_FONT_SIZE: u32 = 100;

/// Length of an intro built from a still image.
pub const INTRO_IMAGE_SECS: f64 = 2.0;

/// Audio bitrate for inserted and intro clips.
const CLIP_AUDIO_KBPS: u32 = 256;

/// Render a section title card.
pub fn render_section(
    ctx: &RenderContext<'_>,
    temps: &mut TempFiles,
    index: usize,
    card: &SectionCard,
    on_progress: &mut dyn FnMut(f64),
) -> PodreelResult<RenderedClip> {
    let layout = &ctx.layout;
    let duration = if card.duration.is_finite() && card.duration > 0.0 {
        card.duration
    } else {
        1.0
    };

    let chars_per_line = ((layout.width as f64 * 0.8) / SECTION_FONT_SIZE as f64).floor() as usize;
    let label = wrap_text(card.label.trim(), chars_per_line.max(1), Language::Japanese);
    let text_file = ctx.write_scratch(temps, "section", "txt", &label)?;

    let output = ctx.scratch.clip_path(ClipKind::Section, index);
    temps.track(&output);

    let mut graph = FilterGraph::new();
    graph.push(title_card_chain(
        "0:v",
        &text_file,
        &ctx.render.subtitle_font,
        SECTION_FONT_SIZE,
        "v",
    ));

    let audio = match ctx.optional_asset("section sound effect", card.sound_effect.as_deref()) {
        Some(se) => InputSpec::file(se),
        None => InputSpec::silence(),
    };
    graph.push(
        FilterChain::link("1:a", "a")
            .then(Filter::new("apad"))
            .then(Filter::new("atrim").arg("duration", num(duration))),
    );

    let invocation = FfmpegInvocation::new("section", &output, duration)
        .input(InputSpec::lavfi(format!(
            "color=c=black:s={}:d={}:r={}",
            layout.size_arg(),
            num(duration),
            ctx.fps()
        )))
        .input(audio)
        .graph(graph)
        .args(["-map", "[v]", "-map", "[a]", "-t", num(duration).as_str()])
        .args(ctx.intermediate_video_args(18))
        .args(ctx.intermediate_audio_args(None));
    ctx.run(&invocation, on_progress)?;

    tracing::debug!(index, label = %card.label, duration_secs = duration, "Section clip rendered");
    Ok(RenderedClip {
        path: output,
        duration_secs: duration,
    })
}

/// Render a trimmed excerpt of an external video.
///
/// The clip is always exactly the trim length. Sources without audio get a
/// silent track so every clip carries one.
pub fn render_inserted_video(
    ctx: &RenderContext<'_>,
    temps: &mut TempFiles,
    index: usize,
    video: &InsertedVideo,
    on_progress: &mut dyn FnMut(f64),
) -> PodreelResult<RenderedClip> {
    if !video.path.exists() {
        return Err(PodreelError::missing_source("inserted video", &video.path));
    }
    let duration = video.trim_duration();
    if duration <= 0.0 {
        return Err(PodreelError::render(format!(
            "Inserted video {} has an empty trim range",
            video.path.display()
        )));
    }

    let has_audio = ctx.probe.has_audio_stream(&video.path);
    let output = ctx.scratch.clip_path(ClipKind::Insert, index);
    temps.track(&output);

    let layout = &ctx.layout;
    let mut graph = FilterGraph::new();
    graph.push(fit_and_pad("0:v", ctx, "v"));

    let mut invocation = FfmpegInvocation::new("insert_video", &output, duration).input(
        InputSpec::file(&video.path)
            .option("-ss", num(video.trim_start))
            .option("-t", num(duration)),
    );
    let audio_map = if has_audio {
        "0:a"
    } else {
        tracing::debug!(path = %video.path.display(), "Inserted video has no audio, adding silence");
        invocation = invocation.input(InputSpec::silence());
        "1:a"
    };

    let invocation = invocation
        .graph(graph)
        .args(["-map", "[v]", "-map", audio_map, "-t", num(duration).as_str()])
        .args(ctx.intermediate_video_args(18))
        .args(["-s", layout.size_arg().as_str()])
        .args(ctx.intermediate_audio_args(Some(CLIP_AUDIO_KBPS)));
    ctx.run(&invocation, on_progress)?;

    Ok(RenderedClip {
        path: output,
        duration_secs: duration,
    })
}

/// Render the optional intro. A missing or unreadable intro is skipped.
pub fn render_intro(
    ctx: &RenderContext<'_>,
    temps: &mut TempFiles,
    intro: &Path,
    on_progress: &mut dyn FnMut(f64),
) -> PodreelResult<Option<RenderedClip>> {
    let Some(intro) = ctx.optional_asset("intro", Some(intro)) else {
        return Ok(None);
    };

    let (input, duration) = if is_video_path(intro) {
        match ctx.probe.duration_secs(intro) {
            Some(secs) if secs > 0.0 => (InputSpec::file(intro), secs),
            _ => {
                tracing::warn!(path = %intro.display(), "Could not measure intro video, skipping it");
                return Ok(None);
            }
        }
    } else {
        (
            InputSpec::file(intro)
                .option("-loop", 1)
                .option("-t", num(INTRO_IMAGE_SECS)),
            INTRO_IMAGE_SECS,
        )
    };

    let output = ctx.scratch.clip_path(ClipKind::Intro, 0);
    temps.track(&output);

    let mut graph = FilterGraph::new();
    graph.push(fit_and_pad("0:v", ctx, "v"));

    let invocation = FfmpegInvocation::new("intro", &output, duration)
        .input(input)
        .input(InputSpec::silence())
        .graph(graph)
        .args(["-map", "[v]", "-map", "1:a", "-t", num(duration).as_str(), "-shortest"])
        .args(ctx.intermediate_video_args(18))
        .args(ctx.intermediate_audio_args(Some(CLIP_AUDIO_KBPS)));
    ctx.run(&invocation, on_progress)?;

    tracing::info!(path = %intro.display(), duration_secs = duration, "Intro clip rendered");
    Ok(Some(RenderedClip {
        path: output,
        duration_secs: duration,
    }))
}

/// Grab the first frame of `video` as a PNG.
///
/// Returns `None` (with a warning) when extraction fails; callers fall back
/// to the moving video.
pub fn extract_still(
    ctx: &RenderContext<'_>,
    temps: &mut TempFiles,
    video: &Path,
) -> PodreelResult<Option<PathBuf>> {
    let output = ctx.scratch.file_path("still", "png");
    temps.track(&output);
    let invocation = FfmpegInvocation::new("still_frame", &output, 0.0)
        .input(InputSpec::file(video).option("-ss", 0))
        .args(["-frames:v", "1", "-q:v", "2"]);
    match ctx.run_quiet(&invocation) {
        Ok(()) if output.exists() => Ok(Some(output)),
        Ok(()) => {
            tracing::warn!(video = %video.display(), "Still frame was not written, using the moving loop");
            Ok(None)
        }
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            tracing::warn!(video = %video.display(), error = %e, "Still frame extraction failed, using the moving loop");
            Ok(None)
        }
    }
}

/// Letterbox into the canvas at the output frame rate.
fn fit_and_pad(input: &str, ctx: &RenderContext<'_>, out: &str) -> FilterChain {
    let (w, h) = (ctx.layout.width, ctx.layout.height);
    FilterChain::link(input, out)
        .then(
            Filter::new("scale")
                .pos(w)
                .pos(h)
                .arg("force_original_aspect_ratio", "decrease"),
        )
        .then(Filter::new("pad").pos(w).pos(h).pos("(ow-iw)/2").pos("(oh-ih)/2"))
        .then(Filter::new("setsar").pos(1))
        .then(Filter::new("fps").pos(ctx.fps()))
        .then(Filter::new("format").pos("yuv420p"))
}

/// Cover the canvas with a still or looping visual, used by gap fillers.
pub(crate) fn cover_chain(input: &str, ctx: &RenderContext<'_>, out: &str) -> FilterChain {
    FilterChain::link(input, out)
        .then_all(cover_filters(&ctx.layout))
        .then(Filter::new("fps").pos(ctx.fps()))
        .then(Filter::new("format").pos("yuv420p"))
}
