//! Speech clip rendering.
//!
//! A speech clip stacks, bottom to top: a black canvas, an optional
//! secondary background, the speaker loop (zoomed on its own, then full
//! frame or a circular picture-in-picture when a background is present),
//! subtitles and the callout. Audio is the speech track, retimed when the
//! speed plan says so, boosted, limited, and optionally mixed with a sound
//! effect.

use std::path::{Path, PathBuf};

use podreel_captions::callout::CalloutTrack;
use podreel_captions::wrap::{normalize_subtitle_text, subtitle_chars_per_line, wrap_text};
use podreel_common::error::{PodreelError, PodreelResult};
use podreel_processing_core::{RenderState, Stage};
use podreel_project_model::segment::{is_video_path, SpeechSegment};

use crate::clips::extract_still;
use crate::compositor::{
    base_canvas, callout_chain, circular_pip, effect_chains, fill_background, fit_speaker,
    overlay, overlay_centered, subtitle_chain, trim_chain, zoom_chain,
};
use crate::context::RenderContext;
use crate::ffmpeg::{FfmpegInvocation, InputSpec};
use crate::graph::{num, Filter, FilterChain, FilterGraph};
use crate::scratch::{ClipKind, RenderedClip, TempFiles};

/// Requested and measured lengths may differ by this much before we warn.
const DURATION_MISMATCH_WARN_SECS: f64 = 0.1;

/// One speech segment ready to render.
#[derive(Debug, Clone, Copy)]
pub struct SpeechJob<'a> {
    pub index: usize,
    pub speech: &'a SpeechSegment,
    /// Length the timeline reserved for this segment.
    pub requested_secs: f64,
    /// Speaker loop for the segment's mood, if the speaker has one.
    pub speaker_video: Option<&'a Path>,
    /// The last clip of the timeline pads its audio to the video length.
    pub is_final: bool,
}

/// A rendered speech clip and the continuity it leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechClip {
    pub clip: RenderedClip,
    /// Zoom reached at the last frame, when the clip zoomed.
    pub end_zoom: Option<f64>,
    /// The speaker was a still frame.
    pub is_static: bool,
    /// Background actually used, for the background cursor.
    pub background: Option<PathBuf>,
    /// Still image suitable for a following gap filler.
    pub gap_visual: Option<PathBuf>,
}

/// Clip length for a speech segment: the longer of what the timeline
/// reserved and the retimed audio, plus `epsilon`.
pub fn speech_clip_secs(requested: f64, audio_secs: Option<f64>, speed: f64, epsilon: f64) -> f64 {
    let speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };
    let requested = if requested.is_finite() { requested.max(0.0) } else { 0.0 };
    let audio = audio_secs
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs / speed)
        .unwrap_or(0.0);
    (requested.max(audio) + epsilon).max(epsilon)
}

/// Render a speech clip.
pub fn render_speech(
    ctx: &RenderContext<'_>,
    temps: &mut TempFiles,
    state: &RenderState,
    job: SpeechJob<'_>,
    on_progress: &mut dyn FnMut(f64),
) -> PodreelResult<SpeechClip> {
    let speech = job.speech;
    if !speech.audio.exists() {
        return Err(PodreelError::missing_source("speech audio", &speech.audio));
    }

    let audio_secs = ctx.probe.duration_secs(&speech.audio);
    let speed = ctx.plan.clip_speed();
    let duration = speech_clip_secs(
        job.requested_secs,
        audio_secs,
        speed,
        ctx.render.clip_epsilon_secs,
    );
    match audio_secs {
        Some(secs) if (secs / speed - job.requested_secs).abs() > DURATION_MISMATCH_WARN_SECS => {
            tracing::warn!(
                index = job.index,
                requested_secs = job.requested_secs,
                audio_secs = secs / speed,
                "Speech audio length differs from the timeline slot"
            );
        }
        None => {
            tracing::warn!(
                index = job.index,
                audio = %speech.audio.display(),
                "Could not probe speech audio, using the timeline slot"
            );
        }
        _ => {}
    }

    let output = ctx.scratch.clip_path(ClipKind::Speech, job.index);
    temps.track(&output);

    let mut inputs = vec![InputSpec::file(&speech.audio)];
    let mut graph = FilterGraph::new();
    let loop_secs = num(duration + 1.0);

    // Speaker: a still frame for echo clips, otherwise the looping video.
    let speaker_video = ctx.optional_asset("speaker video", job.speaker_video);
    let mut still = None;
    if speech.echo {
        if let Some(video) = speaker_video {
            still = extract_still(ctx, temps, video)?;
        }
    }
    let speaker_pad = match (&still, speaker_video) {
        (Some(image), _) => {
            inputs.push(
                InputSpec::file(image)
                    .option("-loop", 1)
                    .option("-t", &loop_secs),
            );
            Some(format!("{}:v", inputs.len() - 1))
        }
        (None, Some(video)) => {
            inputs.push(
                InputSpec::file(video)
                    .option("-stream_loop", -1)
                    .option("-t", &loop_secs),
            );
            Some(format!("{}:v", inputs.len() - 1))
        }
        (None, None) => None,
    };

    let speaker_pad = match (speaker_pad, speech.effect) {
        (Some(pad), Some(effect)) => {
            graph.extend(effect_chains(&pad, effect, "spk_fx"));
            Some("spk_fx".to_string())
        }
        (pad, _) => pad,
    };

    // Zoom acts on the speaker itself, before it is placed on the canvas.
    let mut end_zoom = None;
    let speaker_pad = match speaker_pad {
        Some(pad) if speech.wants_zoom() => {
            let start_zoom = state.zoom_start_for(&speech.speaker, true);
            let frames = ctx.zoom.frames_for(duration);
            graph.push(zoom_chain(
                &pad,
                &ctx.layout,
                &ctx.zoom,
                start_zoom,
                frames,
                still.is_some(),
                "spk_zoom",
            ));
            end_zoom = Some(ctx.zoom.end_zoom(start_zoom, duration));
            Some("spk_zoom".to_string())
        }
        pad => pad,
    };

    graph.push(base_canvas(&ctx.layout, ctx.fps(), duration, "base"));

    let background = ctx.optional_asset("background", speech.background.as_deref());
    let mut current = "base".to_string();
    if let Some(bg) = background {
        let spec = if is_video_path(bg) {
            InputSpec::file(bg)
                .option("-stream_loop", -1)
                .option("-ss", num(state.background_offset_for(Some(bg))))
                .option("-t", &loop_secs)
        } else {
            InputSpec::file(bg).option("-loop", 1).option("-t", &loop_secs)
        };
        inputs.push(spec);
        let bg_pad = format!("{}:v", inputs.len() - 1);
        graph.push(fill_background(&bg_pad, &ctx.layout, "bg"));
        graph.push(overlay_centered("base", "bg", "with_bg"));
        current = "with_bg".into();

        if let Some(pad) = &speaker_pad {
            let pip = &ctx.layout.pip;
            graph.push(circular_pip(pad, pip.diameter, "pip"));
            graph.push(overlay(&current, "pip", pip.x, pip.y, "composed"));
            current = "composed".into();
        }
    } else if let Some(pad) = &speaker_pad {
        graph.push(fit_speaker(pad, &ctx.layout, "spk"));
        graph.push(overlay_centered("base", "spk", "composed"));
        current = "composed".into();
    }

    if ctx.captions {
        let text = normalize_subtitle_text(&speech.text);
        if !text.is_empty() {
            let wrapped = wrap_text(
                &text,
                subtitle_chars_per_line(&ctx.layout, speech.language),
                speech.language,
            );
            let text_file = ctx.write_scratch(temps, "subtitle", "txt", &wrapped)?;
            graph.push(subtitle_chain(
                &current,
                &ctx.layout,
                &text_file,
                &ctx.render.subtitle_font,
                "subbed",
            ));
            current = "subbed".into();
        }
    }

    if let Some(callout) = &speech.callout {
        if let Some(track) = CalloutTrack::build(
            callout,
            speech.language,
            &ctx.layout,
            &ctx.render.callout_font,
            duration,
        ) {
            let ass_file = ctx.write_scratch(temps, "callout", "ass", &track.to_ass())?;
            graph.push(callout_chain(
                &current,
                &ass_file,
                &ctx.render.fonts_dir,
                "called_out",
            ));
            current = "called_out".into();
        }
    }

    graph.push(trim_chain(&current, duration, "v"));

    // Audio: retime, boost, limit, pad the final clip, mix the sound effect.
    let sound_effect = ctx.optional_asset("sound effect", speech.sound_effect.as_deref());
    let voice_out = if sound_effect.is_some() { "voice" } else { "a" };
    let mut voice = FilterChain::link("0:a", voice_out).then_all(
        ctx.plan
            .chain_for(Stage::SpeechClip)
            .factors()
            .iter()
            .map(|factor| Filter::new("atempo").pos(num(*factor))),
    );
    voice = voice
        .then(Filter::new("volume").pos(num(ctx.render.speech_gain)))
        .then(Filter::new("alimiter").arg("limit", 1));
    if job.is_final {
        voice = voice
            .then(Filter::new("apad"))
            .then(Filter::new("atrim").arg("duration", num(duration)));
    }
    graph.push(voice);

    if let Some(se) = sound_effect {
        inputs.push(InputSpec::file(se));
        graph.push(
            FilterChain::link("voice", "a")
                .input(format!("{}:a", inputs.len() - 1))
                .then(
                    Filter::new("amix")
                        .arg("inputs", 2)
                        .arg("duration", "first")
                        .arg("dropout_transition", 0),
                ),
        );
    }

    let mut invocation = FfmpegInvocation::new("speech", &output, duration);
    for input in inputs {
        invocation = invocation.input(input);
    }
    let invocation = invocation
        .graph(graph)
        .args(["-map", "[v]", "-map", "[a]"])
        .args(ctx.intermediate_video_args(23))
        .args(["-s", ctx.layout.size_arg().as_str(), "-threads", "0"])
        .args(ctx.intermediate_audio_args(None));
    ctx.run(&invocation, on_progress)?;

    tracing::debug!(
        index = job.index,
        speaker = %speech.speaker,
        duration_secs = duration,
        end_zoom = ?end_zoom,
        "Speech clip rendered"
    );

    let background = background.map(Path::to_path_buf);
    let gap_visual = still
        .clone()
        .or_else(|| background.clone().filter(|bg| !is_video_path(bg)));
    Ok(SpeechClip {
        clip: RenderedClip {
            path: output,
            duration_secs: duration,
        },
        end_zoom,
        is_static: still.is_some(),
        background,
        gap_visual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_secs_pads_audio() {
        let secs = speech_clip_secs(2.0, Some(2.0), 1.0, 0.05);
        assert!((secs - 2.05).abs() < 1e-9);
    }

    #[test]
    fn test_clip_secs_never_shorter_than_audio() {
        let secs = speech_clip_secs(1.0, Some(3.0), 1.0, 0.05);
        assert!((secs - 3.05).abs() < 1e-9);
    }

    #[test]
    fn test_clip_secs_divides_audio_by_speed() {
        let secs = speech_clip_secs(0.0, Some(3.0), 1.5, 0.05);
        assert!((secs - 2.05).abs() < 1e-9);
    }

    #[test]
    fn test_clip_secs_minimum_is_epsilon() {
        assert!((speech_clip_secs(0.0, None, 1.0, 0.05) - 0.05).abs() < 1e-12);
        assert!((speech_clip_secs(f64::NAN, Some(f64::NAN), 0.0, 0.05) - 0.05).abs() < 1e-12);
    }
}
