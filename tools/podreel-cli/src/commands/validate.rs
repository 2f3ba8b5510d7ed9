//! Validate a Podreel project file.

use std::path::PathBuf;

use podreel_project_model::{LoadedRenderProject, Segment};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let loaded =
        LoadedRenderProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let project = &loaded.project;

    let (mut speech, mut inserts, mut sections) = (0, 0, 0);
    for segment in &project.segments {
        match segment {
            Segment::Speech(_) => speech += 1,
            Segment::InsertVideo(_) => inserts += 1,
            Segment::Section(_) => sections += 1,
        }
    }

    println!("  Title: {}", project.title);
    println!("  Version: {}", project.version);
    println!("  Format: {}", project.format);
    println!("  Speed: {}x", project.playback_speed);
    println!("  Speakers: {}", project.speakers.len());
    println!("  Segments: {speech} speech, {inserts} inserted video, {sections} section");

    let mut errors = vec![];
    if let Err(e) = project.validate() {
        errors.push(e.to_string());
    }
    errors.extend(loaded.validate_sources());

    if errors.is_empty() {
        println!("  Sources: All present");
        println!("\nProject is valid.");
        Ok(())
    } else {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        anyhow::bail!("{} issue(s) found", errors.len())
    }
}
