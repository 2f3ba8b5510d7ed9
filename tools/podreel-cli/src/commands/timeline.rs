//! Show the resolved timeline of a project.

use std::path::PathBuf;

use podreel_common::config::AppConfig;
use podreel_project_model::LoadedRenderProject;
use podreel_render_engine::RenderEngine;

pub fn run(path: PathBuf, json: bool) -> anyhow::Result<()> {
    let loaded =
        LoadedRenderProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let project = loaded.resolved();

    let engine = RenderEngine::with_ffmpeg(AppConfig::load());
    let plan = engine.speed_plan(&project);
    let timeline = engine.build_timeline(&project, &plan);

    if json {
        println!("{}", serde_json::to_string_pretty(&timeline)?);
        return Ok(());
    }

    println!("Timeline: {} ({:?})", project.title, plan);
    println!("{:>4}  {:<8} {:>10} {:>10}", "#", "kind", "start", "duration");
    for entry in timeline.iter() {
        println!(
            "{:>4}  {:<8} {:>10.3} {:>10.3}{}",
            entry.index,
            entry.segment.kind(),
            entry.start_secs,
            entry.duration_secs,
            if entry.requested { "  (requested)" } else { "" }
        );
    }
    println!("Ends at {:.3}s", timeline.end_secs());

    for overlap in &timeline.overlaps {
        println!(
            "[WARN] Segment {} starts {:.3}s before the previous one ends",
            overlap.index,
            overlap.overlap_secs()
        );
    }
    Ok(())
}
