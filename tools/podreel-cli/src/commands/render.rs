//! Render a project to video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use podreel_common::config::{AppConfig, SpeedStage};
use podreel_project_model::{LoadedRenderProject, VideoFormat};
use podreel_render_engine::{
    render_project, ProgressCallback, RenderEngine, RenderPhase, RenderRequest,
};

/// Options for `podreel render`.
pub struct RenderArgs {
    pub project: PathBuf,
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub format: Option<String>,
    pub speed: Option<f64>,
    pub speed_stage: Option<SpeedStage>,
    pub captions: bool,
    pub work_dir: Option<PathBuf>,
    pub json: bool,
}

pub async fn run(args: RenderArgs) -> anyhow::Result<()> {
    let loaded = LoadedRenderProject::load(&args.project)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let mut project = loaded.resolved();
    if let Some(format) = &args.format {
        project.format = VideoFormat::from_tag(format);
    }
    if let Some(speed) = args.speed {
        project.playback_speed = speed;
    }
    if !args.captions {
        project.captions_enabled = false;
    }

    let issues = loaded.validate_sources();
    for issue in &issues {
        println!("  [WARN] {issue}");
    }
    tracing::debug!(issues = issues.len(), "Source check complete");

    let mut config = AppConfig::load();
    if let Some(dir) = args.work_dir {
        config.work_dir = dir;
    }
    if let Some(stage) = args.speed_stage {
        config.render.speed_stage = stage;
    }
    let output_dir = args.output.unwrap_or_else(|| config.output_dir.clone());

    println!("Rendering project: {}", args.project.display());
    println!("  Title: {}", project.title);
    println!("  Format: {}", project.format);
    println!("  Segments: {}", project.segments.len());
    println!("  Speed: {}x ({:?})", project.playback_speed, config.render.speed_stage);
    println!("  Output dir: {}", output_dir.display());

    let engine = Arc::new(RenderEngine::with_ffmpeg(config));
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling render...");
            cancel.cancel();
        }
    });

    let progress: ProgressCallback = Box::new(|phase: RenderPhase, value: f64| {
        print!("\r  Progress: {:<10} {:>5.1}%  ", phase.as_str(), value * 100.0);
        let _ = std::io::stdout().flush();
    });

    let request = RenderRequest {
        project,
        output_dir,
        output_name: args.name,
    };

    match render_project(engine, request, Some(progress)).await {
        Ok(outcome) => {
            println!();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("Render complete: {}", outcome.video.display());
                if let Some(srt) = &outcome.subtitles {
                    println!("  Subtitles: {}", srt.display());
                }
                println!(
                    "  Clips: {} ({} gap fillers), length {:.2}s",
                    outcome.clips, outcome.gaps, outcome.output_secs
                );
                if outcome.overlaps > 0 {
                    println!("  Overlapping requested starts: {}", outcome.overlaps);
                }
            }
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("\nRender cancelled.");
            Err(e.into())
        }
        Err(e) => {
            println!("\nRender failed: {e}");
            Err(e.into())
        }
    }
}
