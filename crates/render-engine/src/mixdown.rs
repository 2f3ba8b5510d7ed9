//! Background music mix and the final distribution encode.

use std::path::{Path, PathBuf};

use podreel_common::config::EncodeDefaults;
use podreel_common::error::PodreelResult;
use podreel_processing_core::{SpeedPlan, Stage};
use podreel_project_model::project::BgmTrack;

use crate::context::RenderContext;
use crate::ffmpeg::{FfmpegInvocation, InputSpec};
use crate::graph::{num, Filter, FilterChain, FilterGraph};
use crate::progress::ProgressScope;
use crate::scratch::{ClipKind, TempFiles};

/// Effective BGM gain: the track's volume or `default`, clamped to `[0, 1]`.
pub fn bgm_volume(track: &BgmTrack, default: f64) -> f64 {
    let volume = track
        .volume
        .filter(|v| v.is_finite())
        .unwrap_or(default);
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Mix background music under the joined timeline.
///
/// Returns the mixed file, or `None` when there is no usable track. The
/// speed plan is never consulted here: whatever retiming applies has either
/// happened in the clips or happens at the final encode.
pub fn mix_bgm(
    ctx: &RenderContext<'_>,
    temps: &mut TempFiles,
    input: &Path,
    bgm: Option<&BgmTrack>,
    expected_secs: f64,
    progress: ProgressScope<'_>,
) -> PodreelResult<Option<PathBuf>> {
    let Some(track) = bgm else {
        progress.finish();
        return Ok(None);
    };
    if !track.path.exists() {
        tracing::warn!(path = %track.path.display(), "BGM file not found, skipping mix");
        progress.finish();
        return Ok(None);
    }

    let duration = match ctx.probe.duration_secs(input) {
        Some(secs) if secs > 0.0 => secs,
        _ => {
            tracing::debug!(expected_secs, "Could not probe joined timeline, using expected length");
            expected_secs
        }
    };
    let volume = bgm_volume(track, ctx.render.default_bgm_volume);

    let output = ctx.scratch.clip_path(ClipKind::Mixed, 0);
    temps.track(&output);

    let mut graph = FilterGraph::new();
    graph.push(FilterChain::link("0:a", "a1").then(Filter::new("volume").pos("1.0")));
    graph.push(FilterChain::link("1:a", "a2").then(Filter::new("volume").pos(num(volume))));
    graph.push(
        FilterChain::link("a1", "aout").input("a2").then(
            Filter::new("amix")
                .arg("inputs", 2)
                .arg("duration", "longest")
                .arg("dropout_transition", 0),
        ),
    );

    let invocation = FfmpegInvocation::new("bgm_mix", &output, duration)
        .input(InputSpec::file(input))
        .input(
            InputSpec::file(&track.path)
                .option("-stream_loop", -1)
                .option("-t", num(duration)),
        )
        .graph(graph)
        .args(["-map", "0:v", "-map", "[aout]"])
        .args(["-c:v", "libx264", "-preset", "ultrafast", "-crf", "23"])
        .args(ctx.intermediate_audio_args(Some(256)))
        .args(["-shortest"]);

    tracing::info!(bgm = %track.path.display(), volume, duration_secs = duration, "Mixing background music");
    ctx.run(&invocation, &mut |fraction| progress.report(fraction))?;
    progress.finish();
    Ok(Some(output))
}

/// Build the final encode invocation.
///
/// Under [`SpeedPlan::AtFinalEncode`] audio gets the atempo chain and video
/// timestamps are divided by the same speed so both stay aligned.
pub fn final_encode_invocation(
    input: &Path,
    output: &Path,
    encode: &EncodeDefaults,
    plan: &SpeedPlan,
    fps: u32,
    input_secs: f64,
) -> FfmpegInvocation {
    let expected = input_secs * plan.output_time_scale();
    let mut invocation =
        FfmpegInvocation::new("final_encode", output, expected).input(InputSpec::file(input));

    let chain = plan.chain_for(Stage::FinalEncode);
    match plan.video_speed_at_encode() {
        Some(speed) if !chain.is_empty() => {
            let mut graph = FilterGraph::new();
            graph.push(
                FilterChain::link("0:v", "v")
                    .then(Filter::new("setpts").pos(format!("PTS/{}", num(speed)))),
            );
            graph.push(
                FilterChain::link("0:a", "a").then_all(
                    chain
                        .factors()
                        .iter()
                        .map(|factor| Filter::new("atempo").pos(num(*factor))),
                ),
            );
            invocation = invocation.graph(graph).args(["-map", "[v]", "-map", "[a]"]);
        }
        _ => {
            invocation = invocation.args(["-map", "0:v", "-map", "0:a"]);
        }
    }

    let keyint = encode.keyframe_interval.max(1).to_string();
    invocation
        .args(["-c:v", "libx264", "-preset", encode.preset.as_str()])
        .args(["-b:v".to_string(), format!("{}k", encode.video_bitrate_kbps)])
        .args(["-g", keyint.as_str(), "-keyint_min", keyint.as_str()])
        .args(["-sc_threshold", "0", "-pix_fmt", "yuv420p"])
        .args(["-r".to_string(), fps.max(1).to_string()])
        .args(["-c:a".to_string(), "aac".to_string()])
        .args(["-b:a".to_string(), format!("{}k", encode.audio_bitrate_kbps)])
        .args(["-movflags", "+faststart"])
}

/// Encode the distributable `.mp4`.
pub fn final_encode(
    ctx: &RenderContext<'_>,
    input: &Path,
    output: &Path,
    encode: &EncodeDefaults,
    input_secs: f64,
    progress: ProgressScope<'_>,
) -> PodreelResult<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let invocation =
        final_encode_invocation(input, output, encode, &ctx.plan, ctx.fps(), input_secs);
    tracing::info!(output = %output.display(), speed = ctx.plan.speed(), "Final encode");
    ctx.run(&invocation, &mut |fraction| progress.report(fraction))?;
    progress.finish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use podreel_common::SpeedStage;

    fn track(volume: Option<f64>) -> BgmTrack {
        BgmTrack {
            path: PathBuf::from("bgm.mp3"),
            volume,
        }
    }

    #[test]
    fn test_bgm_volume_defaults_and_clamps() {
        assert_eq!(bgm_volume(&track(None), 0.2), 0.2);
        assert_eq!(bgm_volume(&track(Some(3.0)), 0.2), 1.0);
        assert_eq!(bgm_volume(&track(Some(-1.0)), 0.2), 0.0);
        assert_eq!(bgm_volume(&track(Some(f64::NAN)), 0.2), 0.2);
    }

    #[test]
    fn test_final_encode_without_speed_maps_streams() {
        let plan = SpeedPlan::decide(1.0, SpeedStage::PerSegment);
        let invocation = final_encode_invocation(
            Path::new("in.mkv"),
            Path::new("out.mp4"),
            &EncodeDefaults::default(),
            &plan,
            30,
            10.0,
        );
        let args = invocation.to_args().join(" ");
        assert!(args.contains("-map 0:v -map 0:a"));
        assert!(args.contains("-c:v libx264 -preset fast -b:v 8000k -g 60 -keyint_min 60 -sc_threshold 0 -pix_fmt yuv420p -r 30"));
        assert!(args.contains("-c:a aac -b:a 256k -movflags +faststart"));
        assert!(!args.contains("atempo"));
        assert!(args.ends_with("out.mp4"));
    }

    #[test]
    fn test_final_encode_applies_speed_to_both_streams() {
        let plan = SpeedPlan::decide(2.5, SpeedStage::FinalEncode);
        let invocation = final_encode_invocation(
            Path::new("in.mkv"),
            Path::new("out.mp4"),
            &EncodeDefaults::default(),
            &plan,
            30,
            10.0,
        );
        let graph = invocation.filter_graph.as_ref().unwrap().to_string();
        assert_eq!(graph, "[0:v]setpts=PTS/2.5[v];[0:a]atempo=2,atempo=1.25[a]");
        assert!((invocation.expected_duration_secs - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_final_encode_skips_speed_under_per_segment_plan() {
        let plan = SpeedPlan::decide(2.5, SpeedStage::PerSegment);
        let invocation = final_encode_invocation(
            Path::new("in.mkv"),
            Path::new("out.mp4"),
            &EncodeDefaults::default(),
            &plan,
            30,
            10.0,
        );
        assert!(invocation.filter_graph.is_none());
        assert!(!invocation.mentions("atempo"));
    }
}
