//! Scratch files for one render session.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use podreel_common::clock::SessionToken;
use podreel_common::error::PodreelResult;

/// What an intermediate clip holds; decides its file name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipKind {
    Speech,
    Gap,
    Section,
    Insert,
    Intro,
    /// Output of one concat chunk.
    Chunk,
    /// Concatenated timeline before mixing.
    Joined,
    /// Timeline with background music mixed in.
    Mixed,
}

impl ClipKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Speech => "clip_",
            Self::Gap => "clip_gap_",
            Self::Section => "clip_section_",
            Self::Insert => "clip_insert_",
            Self::Intro => "clip_intro_",
            Self::Chunk => "concat_chunk_",
            Self::Joined => "joined_",
            Self::Mixed => "mixed_",
        }
    }
}

/// A finished intermediate clip.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedClip {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Directory plus naming scheme for one render.
///
/// Every name embeds the session token and a counter, so two renders
/// sharing a work dir never collide.
#[derive(Debug)]
pub struct ScratchDir {
    dir: PathBuf,
    token: SessionToken,
    counter: AtomicU64,
}

impl ScratchDir {
    pub fn create(dir: impl Into<PathBuf>, token: SessionToken) -> PodreelResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            token,
            counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Path for a Matroska intermediate.
    pub fn clip_path(&self, kind: ClipKind, index: usize) -> PathBuf {
        self.dir.join(format!(
            "{}{index}_{}_{}.mkv",
            kind.prefix(),
            self.token,
            self.next()
        ))
    }

    /// Path for a helper file (text files, cue tracks, stills).
    pub fn file_path(&self, stem: &str, extension: &str) -> PathBuf {
        self.dir
            .join(format!("{stem}_{}_{}.{extension}", self.token, self.next()))
    }
}

/// Files to delete once a render is over.
///
/// Anything still tracked when the guard drops is removed, so early returns
/// through `?` clean up too. Removal failures are logged only.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked file that exists. Returns how many were removed.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for path in self.paths.drain(..) {
            if remove_quietly(&path) {
                removed += 1;
            }
        }
        removed
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        let removed = self.cleanup();
        if removed > 0 {
            tracing::debug!(removed, "Temporary files removed");
        }
    }
}

/// Remove a file if present. Returns whether it was removed.
pub fn remove_quietly(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_names_embed_token_and_counter() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(dir.path(), SessionToken::from_string("tok")).unwrap();
        let a = scratch.clip_path(ClipKind::Gap, 3);
        let b = scratch.clip_path(ClipKind::Gap, 3);
        assert_eq!(a.file_name().unwrap(), "clip_gap_3_tok_0.mkv");
        assert_eq!(b.file_name().unwrap(), "clip_gap_3_tok_1.mkv");
        let text = scratch.file_path("subtitle", "txt");
        assert_eq!(text.file_name().unwrap(), "subtitle_tok_2.txt");
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(ClipKind::Speech.prefix(), "clip_");
        assert_eq!(ClipKind::Section.prefix(), "clip_section_");
        assert_eq!(ClipKind::Insert.prefix(), "clip_insert_");
        assert_eq!(ClipKind::Intro.prefix(), "clip_intro_");
    }

    #[test]
    fn test_temp_files_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mkv");
        let b = dir.path().join("b.mkv");
        std::fs::write(&a, b"x").unwrap();
        {
            let mut temps = TempFiles::new();
            temps.track(&a);
            temps.track(&b);
            assert_eq!(temps.len(), 2);
        }
        assert!(!a.exists());
    }

    #[test]
    fn test_cleanup_counts_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mkv");
        std::fs::write(&a, b"x").unwrap();
        let mut temps = TempFiles::new();
        temps.track(&a);
        temps.track(dir.path().join("missing.mkv"));
        assert_eq!(temps.cleanup(), 1);
        assert!(temps.is_empty());
    }
}
