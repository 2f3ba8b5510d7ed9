//! Clip concatenation.
//!
//! Lists longer than the per-pass ceiling are split into ceiling-sized
//! chunks; each chunk is joined into a scratch file, then the chunk files
//! are joined. Chunk files are removed however the merge ends.

use std::path::Path;

use podreel_common::error::{PodreelError, PodreelResult};

use crate::context::RenderContext;
use crate::ffmpeg::{FfmpegInvocation, InputSpec};
use crate::graph::{Filter, FilterChain, FilterGraph};
use crate::progress::ProgressScope;
use crate::scratch::{ClipKind, RenderedClip, TempFiles};

/// Share of a chunked pass spent on the chunks; the merge gets the rest.
const CHUNK_SHARE: f64 = 0.8;

/// Audio bitrate of concatenated output.
const CONCAT_AUDIO_KBPS: u32 = 256;

/// Join `clips` into `output`.
///
/// `max_inputs` is clamped to at least 2. An empty list fails with
/// [`PodreelError::NoClips`]; a single clip is copied as is.
pub fn concat_clips(
    ctx: &RenderContext<'_>,
    clips: &[RenderedClip],
    output: &Path,
    max_inputs: usize,
    progress: ProgressScope<'_>,
) -> PodreelResult<()> {
    let max_inputs = max_inputs.max(2);
    match clips.len() {
        0 => Err(PodreelError::NoClips),
        1 => {
            ctx.cancel.check()?;
            ctx.transcoder.copy_file(&clips[0].path, output)?;
            progress.finish();
            Ok(())
        }
        n if n <= max_inputs => concat_pass(ctx, clips, output, progress),
        n => {
            let chunk_count = n.div_ceil(max_inputs);
            tracing::info!(clips = n, chunks = chunk_count, max_inputs, "Concatenating in chunks");

            // Dropped on every exit path, removing whatever chunks exist.
            let mut chunk_files = TempFiles::new();
            let mut chunks = Vec::with_capacity(chunk_count);
            for (i, chunk) in clips.chunks(max_inputs).enumerate() {
                let path = ctx.scratch.clip_path(ClipKind::Chunk, i);
                chunk_files.track(&path);
                let scope = progress.sub(
                    CHUNK_SHARE * i as f64 / chunk_count as f64,
                    CHUNK_SHARE * (i + 1) as f64 / chunk_count as f64,
                );
                concat_clips(ctx, chunk, &path, max_inputs, scope)?;
                chunks.push(RenderedClip {
                    path,
                    duration_secs: total_secs(chunk),
                });
            }

            concat_clips(
                ctx,
                &chunks,
                output,
                max_inputs,
                progress.sub(CHUNK_SHARE, 1.0),
            )
        }
    }
}

/// Total nominal length of `clips`.
pub fn total_secs(clips: &[RenderedClip]) -> f64 {
    clips.iter().map(|clip| clip.duration_secs.max(0.0)).sum()
}

/// Filter graph joining `count` inputs with their audio resynced.
pub fn concat_graph(count: usize) -> FilterGraph {
    let mut join = FilterChain::new();
    for i in 0..count {
        join = join.input(format!("{i}:v")).input(format!("{i}:a"));
    }
    let join = join
        .then(
            Filter::new("concat")
                .arg("n", count)
                .arg("v", 1)
                .arg("a", 1),
        )
        .output("vout")
        .output("aout");

    let mut graph = FilterGraph::new();
    graph.push(join);
    graph.push(
        FilterChain::link("aout", "afixed").then(
            Filter::new("aresample")
                .arg("async", 1)
                .arg("min_hard_comp", "0.01")
                .arg("first_pts", 0),
        ),
    );
    graph
}

fn concat_pass(
    ctx: &RenderContext<'_>,
    clips: &[RenderedClip],
    output: &Path,
    progress: ProgressScope<'_>,
) -> PodreelResult<()> {
    let mut invocation = FfmpegInvocation::new("concat", output, total_secs(clips));
    for clip in clips {
        invocation = invocation.input(InputSpec::file(&clip.path));
    }
    let invocation = invocation
        .graph(concat_graph(clips.len()))
        .args(["-map", "[vout]", "-map", "[afixed]"])
        .args(ctx.intermediate_video_args(23))
        .args(ctx.intermediate_audio_args(Some(CONCAT_AUDIO_KBPS)));

    tracing::debug!(inputs = clips.len(), output = %output.display(), "Concat pass");
    ctx.run(&invocation, &mut |fraction| progress.report(fraction))?;
    progress.finish();
    Ok(())
}
