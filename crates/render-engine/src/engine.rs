//! Render orchestration.
//!
//! A render resolves the timeline, renders the intro, folds over the
//! segments in start order (filling gaps and threading [`RenderState`]),
//! joins every clip, mixes background music, encodes the final `.mp4` and
//! writes subtitles next to it. Scratch files are removed whether the
//! render succeeds or not.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use podreel_captions::subtitles::{cues_from_timeline, save_subtitles};
use podreel_common::clock::{unix_millis, SessionToken, StageTimer};
use podreel_common::config::AppConfig;
use podreel_common::error::{PodreelError, PodreelResult};
use podreel_processing_core::{
    RenderState, SpeedPlan, TimelineBuilder, TimelineConfig, ZoomConfig,
};
use podreel_project_model::layout::Layout;
use podreel_project_model::project::RenderProject;
use podreel_project_model::segment::{is_video_path, Segment};
use podreel_project_model::timeline::{TimedSegment, Timeline};

use crate::clips::{render_inserted_video, render_intro, render_section};
use crate::concat::{concat_clips, total_secs};
use crate::context::RenderContext;
use crate::ffmpeg::{FfmpegCli, MediaProbe, Transcoder};
use crate::filler::{choose_gap_visual, render_gap};
use crate::mixdown::{final_encode, mix_bgm};
use crate::progress::{CancelToken, ProgressCallback, ProgressReporter, ProgressScope, RenderPhase};
use crate::scratch::{remove_quietly, ClipKind, RenderedClip, ScratchDir, TempFiles};
use crate::speech::{render_speech, SpeechJob};

/// Longest file stem produced by [`sanitize_output_name`].
pub const MAX_OUTPUT_NAME_CHARS: usize = 100;

/// One render request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Project with asset paths already resolved.
    pub project: RenderProject,

    /// Directory receiving the `.mp4` and `.srt`.
    pub output_dir: PathBuf,

    /// File stem override; the project title is used otherwise.
    pub output_name: Option<String>,
}

/// Summary of a finished render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    pub video: PathBuf,
    pub subtitles: Option<PathBuf>,
    /// Length of the joined timeline before any final-encode retiming.
    pub timeline_secs: f64,
    /// Expected length of the output file.
    pub output_secs: f64,
    pub clips: usize,
    pub gaps: usize,
    pub overlaps: usize,
}

/// Result of the segment fold.
#[derive(Debug, Default)]
struct Folded {
    clips: Vec<RenderedClip>,
    gaps: usize,
    /// Segments at the positions they were actually placed.
    placed: Timeline,
}

/// Renders projects with a given transcoder and probe.
pub struct RenderEngine {
    config: AppConfig,
    transcoder: Arc<dyn Transcoder>,
    probe: Arc<dyn MediaProbe>,
    cancel: CancelToken,
}

impl RenderEngine {
    pub fn new(
        config: AppConfig,
        transcoder: Arc<dyn Transcoder>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        Self {
            config,
            transcoder,
            probe,
            cancel: CancelToken::new(),
        }
    }

    /// Engine backed by the configured ffmpeg and ffprobe binaries.
    pub fn with_ffmpeg(config: AppConfig) -> Self {
        let cancel = CancelToken::new();
        let cli = Arc::new(FfmpegCli::new(&config.tools).with_cancel_token(cancel.clone()));
        Self {
            config,
            transcoder: cli.clone(),
            probe: cli,
            cancel,
        }
    }

    /// Share `cancel` with the caller. The transcoder must poll the same
    /// token for running processes to be interrupted.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Decide which stage applies the project's playback speed.
    pub fn speed_plan(&self, project: &RenderProject) -> SpeedPlan {
        SpeedPlan::decide(project.playback_speed, self.config.render.speed_stage)
    }

    /// Resolve segment starts and durations.
    pub fn build_timeline(&self, project: &RenderProject, plan: &SpeedPlan) -> Timeline {
        let config = TimelineConfig {
            speed: plan.clip_speed(),
            overlap_secs: project.overlap_secs,
            ..Default::default()
        };
        let probe = |path: &Path| self.probe.duration_secs(path);
        TimelineBuilder::new(config, &probe).build(&project.segments)
    }

    /// Render synchronously. Blocks on every transcoder call.
    pub fn render(
        &self,
        request: RenderRequest,
        reporter: &ProgressReporter,
    ) -> PodreelResult<RenderOutcome> {
        let timer = StageTimer::start("render");
        let project = &request.project;
        project
            .validate()
            .map_err(|e| PodreelError::project(e.to_string()))?;

        let plan = self.speed_plan(project);
        let timeline = self.build_timeline(project, &plan);
        tracing::info!(
            title = %project.title,
            format = %project.format,
            segments = timeline.len(),
            timeline_secs = timeline.end_secs(),
            plan = ?plan,
            "Starting render"
        );

        let scratch = ScratchDir::create(&self.config.work_dir, SessionToken::new())?;
        let ctx = RenderContext {
            layout: Layout::for_format(project.format),
            render: &self.config.render,
            plan,
            zoom: ZoomConfig {
                fps: self.config.render.fps.max(1),
                ..Default::default()
            },
            captions: project.captions_enabled,
            transcoder: self.transcoder.as_ref(),
            probe: self.probe.as_ref(),
            scratch: &scratch,
            cancel: &self.cancel,
        };

        let mut temps = TempFiles::new();
        let result = self.render_with(&ctx, &mut temps, &request, &timeline, reporter);

        let removed = temps.cleanup();
        if project.owns_segment_images {
            remove_segment_images(project);
        }

        match &result {
            Ok(outcome) => tracing::info!(
                output = %outcome.video.display(),
                clips = outcome.clips,
                gaps = outcome.gaps,
                output_secs = outcome.output_secs,
                temp_files_removed = removed,
                "Render complete"
            ),
            Err(e) if e.is_cancelled() => {
                tracing::info!(temp_files_removed = removed, "Render cancelled")
            }
            Err(e) => tracing::error!(error = %e, temp_files_removed = removed, "Render failed"),
        }
        timer.finish();
        result
    }

    fn render_with(
        &self,
        ctx: &RenderContext<'_>,
        temps: &mut TempFiles,
        request: &RenderRequest,
        timeline: &Timeline,
        reporter: &ProgressReporter,
    ) -> PodreelResult<RenderOutcome> {
        let project = &request.project;
        let generation = reporter.scope(RenderPhase::Generation);

        let mut clips = Vec::new();
        let mut intro_secs = 0.0;
        if let Some(intro) = &project.intro {
            if let Some(clip) = render_intro(ctx, temps, intro, &mut |_| {})? {
                intro_secs = clip.duration_secs;
                clips.push(clip);
            }
        }

        let timer = StageTimer::start("generation");
        let folded = self.render_segments(ctx, temps, project, timeline, generation)?;
        timer.finish();
        let gaps = folded.gaps;
        clips.extend(folded.clips);
        generation.finish();

        let assembly = reporter.scope(RenderPhase::Assembly);
        let timer = StageTimer::start("assembly");
        let joined = ctx.scratch.clip_path(ClipKind::Joined, 0);
        temps.track(&joined);
        concat_clips(
            ctx,
            &clips,
            &joined,
            self.config.render.max_clips_per_concat,
            assembly.sub(0.0, 0.6),
        )?;
        let joined_secs = total_secs(&clips);

        let mixed = mix_bgm(
            ctx,
            temps,
            &joined,
            project.bgm.as_ref(),
            joined_secs,
            assembly.sub(0.6, 0.8),
        )?;
        let encode_input = mixed.as_deref().unwrap_or(joined.as_path());

        let stem = sanitize_output_name(request.output_name.as_deref().unwrap_or(project.title.as_str()));
        let video = request.output_dir.join(format!("{stem}.mp4"));
        final_encode(
            ctx,
            encode_input,
            &video,
            &self.config.encode,
            joined_secs,
            assembly.sub(0.8, 1.0),
        )?;
        assembly.finish();
        timer.finish();

        let subtitles = if project.captions_enabled {
            write_subtitles(&folded.placed, &video, intro_secs, ctx.plan.output_time_scale())
        } else {
            None
        };

        Ok(RenderOutcome {
            video,
            subtitles,
            timeline_secs: joined_secs,
            output_secs: joined_secs * ctx.plan.output_time_scale(),
            clips: clips.len(),
            gaps,
            overlaps: timeline.overlaps.len(),
        })
    }

    /// Render every segment in script order, filling gaps between them.
    fn render_segments(
        &self,
        ctx: &RenderContext<'_>,
        temps: &mut TempFiles,
        project: &RenderProject,
        timeline: &Timeline,
        progress: ProgressScope<'_>,
    ) -> PodreelResult<Folded> {
        let entries = &timeline.entries;
        let total = entries.len().max(1) as f64;
        let last = entries.len().checked_sub(1);
        let threshold = self.config.render.gap_threshold_secs.max(0.0);
        let overlap_slack = threshold + self.config.render.clip_epsilon_secs.max(0.0);

        let mut folded = Folded::default();
        let mut state = RenderState::default();
        let mut cursor = 0.0_f64;

        for (pos, entry) in entries.iter().enumerate() {
            ctx.cancel.check()?;
            let clip_scope = progress.sub(pos as f64 / total, (pos + 1) as f64 / total);

            let gap = entry.start_secs - cursor;
            if gap > threshold {
                let visual = choose_gap_visual(&state, project.default_background.as_deref());
                let clip = render_gap(ctx, temps, entry.index, gap, &visual, &mut |_| {})?;
                cursor += clip.duration_secs;
                state = state.after_gap(gap);
                folded.gaps += 1;
                folded.clips.push(clip);
            } else if gap < -overlap_slack {
                tracing::warn!(
                    index = entry.index,
                    cursor_secs = cursor,
                    start_secs = entry.start_secs,
                    "Segment starts before the previous clip ends; placing it after"
                );
            }

            let start = cursor.max(entry.start_secs);
            let mut on_progress = |fraction: f64| clip_scope.report(fraction);
            let clip = match &entry.segment {
                Segment::Speech(speech) => {
                    let speaker_video = match project.speakers.get(&speech.speaker) {
                        Some(profile) => profile.video_for(speech.mood.as_deref()),
                        None => {
                            tracing::warn!(
                                index = entry.index,
                                speaker = %speech.speaker,
                                "Unknown speaker, rendering without a speaker loop"
                            );
                            None
                        }
                    };
                    let job = SpeechJob {
                        index: entry.index,
                        speech,
                        requested_secs: entry.duration_secs,
                        speaker_video,
                        is_final: last == Some(pos),
                    };
                    let rendered = render_speech(ctx, temps, &state, job, &mut on_progress)?;
                    state = state.after_speech(
                        &speech.speaker,
                        rendered.end_zoom,
                        rendered.background.as_deref(),
                        rendered.gap_visual.clone(),
                        rendered.clip.duration_secs,
                        rendered.is_static,
                    );
                    rendered.clip
                }
                Segment::InsertVideo(video) => {
                    let clip =
                        render_inserted_video(ctx, temps, entry.index, video, &mut on_progress)?;
                    state = state.after_other(clip.duration_secs);
                    clip
                }
                Segment::Section(card) => {
                    let clip = render_section(ctx, temps, entry.index, card, &mut on_progress)?;
                    state = state.after_other(clip.duration_secs);
                    clip
                }
            };

            folded.placed.entries.push(TimedSegment {
                index: entry.index,
                segment: entry.segment.clone(),
                start_secs: start,
                duration_secs: clip.duration_secs,
                requested: entry.requested,
            });
            cursor = start + clip.duration_secs;
            clip_scope.finish();
            folded.clips.push(clip);
        }

        folded.placed.overlaps = timeline.overlaps.clone();
        tracing::info!(
            clips = folded.clips.len(),
            gaps = folded.gaps,
            end_secs = cursor,
            "Segments rendered"
        );
        Ok(folded)
    }
}

/// Render on a blocking task so the async caller stays responsive.
pub async fn render_project(
    engine: Arc<RenderEngine>,
    request: RenderRequest,
    progress: Option<ProgressCallback>,
) -> PodreelResult<RenderOutcome> {
    let task = tokio::task::spawn_blocking(move || {
        let reporter = ProgressReporter::new(progress);
        engine.render(request, &reporter)
    });
    match task.await {
        Ok(result) => result,
        Err(e) => Err(PodreelError::render(format!("Render task failed: {e}"))),
    }
}

/// Write the `.srt` beside `video`. Failures are logged, not fatal.
fn write_subtitles(
    placed: &Timeline,
    video: &Path,
    intro_secs: f64,
    time_scale: f64,
) -> Option<PathBuf> {
    let cues = cues_from_timeline(placed, intro_secs, time_scale);
    if cues.is_empty() {
        return None;
    }
    let path = video.with_extension("srt");
    match save_subtitles(&cues, &path) {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write subtitles");
            None
        }
    }
}

/// Delete still-image backgrounds the project marked as disposable.
fn remove_segment_images(project: &RenderProject) {
    let mut removed = 0;
    for segment in &project.segments {
        if let Segment::Speech(speech) = segment {
            if let Some(bg) = speech.background.as_deref().filter(|bg| !is_video_path(bg)) {
                if remove_quietly(bg) {
                    removed += 1;
                }
            }
        }
    }
    tracing::debug!(removed, "Segment images removed");
}

/// File stem for the final video.
///
/// Characters outside `[A-Za-z0-9_ .-]` and whitespace become `_`, runs of
/// `_` collapse, and the result is cut to [`MAX_OUTPUT_NAME_CHARS`]. An
/// empty result falls back to `output-<unix millis>`.
pub fn sanitize_output_name(title: &str) -> String {
    let mut name = String::with_capacity(title.len());
    for c in title.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            c
        } else {
            '_'
        };
        if c == '_' && name.ends_with('_') {
            continue;
        }
        name.push(c);
    }
    let name: String = name.chars().take(MAX_OUTPUT_NAME_CHARS).collect();
    if name.trim_matches('_').is_empty() {
        format!("output-{}", unix_millis())
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_and_collapses() {
        assert_eq!(sanitize_output_name("My Show: Ep 1!"), "My_Show_Ep_1_");
        assert_eq!(sanitize_output_name("a  \t b"), "a_b");
        assert_eq!(sanitize_output_name("v1.2-final"), "v1.2-final");
        assert_eq!(sanitize_output_name("日本語タイトル x"), "_x");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(250);
        assert_eq!(sanitize_output_name(&long).len(), MAX_OUTPUT_NAME_CHARS);
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert!(sanitize_output_name("").starts_with("output-"));
        assert!(sanitize_output_name("   ").starts_with("output-"));
        assert!(sanitize_output_name("???").starts_with("output-"));
    }
}
