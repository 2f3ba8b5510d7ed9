//! Initialize a new Podreel project file.

use std::path::PathBuf;

use podreel_project_model::{LoadedRenderProject, VideoFormat};

pub fn run(path: PathBuf, title: String, format: String) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    let format = VideoFormat::from_tag(&format);
    println!("Creating project '{}' at {}", title, path.display());

    let loaded = LoadedRenderProject::create(&path, &title, format)
        .map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))?;

    println!("Project created successfully:");
    println!("  File: {}", loaded.path.display());
    println!("  Format: {format}");
    println!();
    println!("Asset paths are resolved relative to {}:", loaded.root.display());
    println!("  audio/       (speech lines, BGM)");
    println!("  speakers/    (speaker loop videos)");
    Ok(())
}
