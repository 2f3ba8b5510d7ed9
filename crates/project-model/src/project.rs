//! Render project file types.
//!
//! A render project is a single JSON file listing the segments of one video
//! plus the shared assets (speaker loops, BGM, intro, default background).
//! Relative paths are resolved against the directory containing the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::VideoFormat;
use crate::segment::{Language, Segment, SpeechSegment};

/// Top-level render project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderProject {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Video title, also used for the output filename.
    #[serde(default)]
    pub title: String,

    /// Creation timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default)]
    pub format: VideoFormat,

    /// Global playback speed multiplier.
    #[serde(default = "default_speed")]
    pub playback_speed: f64,

    /// Seconds each speech turn may overlap the next.
    #[serde(default)]
    pub overlap_secs: f64,

    /// Burn subtitles into speech clips.
    #[serde(default = "default_true")]
    pub captions_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm: Option<BgmTrack>,

    /// Image or video played before the first segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<PathBuf>,

    /// Still used for gaps before any image has been shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_background: Option<PathBuf>,

    /// Delete segment background images after rendering.
    #[serde(default)]
    pub owns_segment_images: bool,

    /// Speaker id to looping video.
    #[serde(default)]
    pub speakers: BTreeMap<String, SpeakerProfile>,

    pub segments: Vec<Segment>,
}

/// Background music track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgmTrack {
    pub path: PathBuf,

    /// Linear gain in `[0, 1]`. Uses the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Looping videos for one speaker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakerProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<PathBuf>,

    /// Mood tag to alternative loop.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub moods: BTreeMap<String, PathBuf>,
}

impl SpeakerProfile {
    /// Loop for a mood, falling back to the default loop.
    pub fn video_for(&self, mood: Option<&str>) -> Option<&Path> {
        mood.and_then(|m| self.moods.get(m))
            .or(self.video.as_ref())
            .map(PathBuf::as_path)
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_speed() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// A render project together with where it was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedRenderProject {
    /// Path of the project file.
    pub path: PathBuf,

    /// Directory relative paths are resolved against.
    pub root: PathBuf,

    pub project: RenderProject,
}

impl RenderProject {
    /// Create an empty project.
    pub fn new(title: impl Into<String>, format: VideoFormat) -> Self {
        Self {
            version: default_version(),
            title: title.into(),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            format,
            playback_speed: default_speed(),
            overlap_secs: 0.0,
            captions_enabled: true,
            bgm: None,
            intro: None,
            default_background: None,
            owns_segment_images: false,
            speakers: BTreeMap::new(),
            segments: vec![],
        }
    }

    /// A small example project used by `podreel init`.
    pub fn starter(title: impl Into<String>, format: VideoFormat) -> Self {
        let mut project = Self::new(title, format);
        project.bgm = Some(BgmTrack {
            path: PathBuf::from("audio/bgm.mp3"),
            volume: Some(0.2),
        });
        project.speakers.insert(
            "host".to_string(),
            SpeakerProfile {
                video: Some(PathBuf::from("speakers/host.mp4")),
                moods: BTreeMap::new(),
            },
        );
        project.segments = vec![
            Segment::Speech(SpeechSegment {
                audio: PathBuf::from("audio/001.wav"),
                text: "Welcome to the show.".to_string(),
                speaker: "host".to_string(),
                mood: None,
                background: None,
                sound_effect: None,
                echo: false,
                zoom: false,
                effect: None,
                language: Language::English,
                callout: None,
                requested_start: None,
                known_duration: None,
            }),
            Segment::Section(crate::segment::SectionCard {
                label: "Chapter 1".to_string(),
                duration: 2.0,
                sound_effect: None,
            }),
        ];
        project
    }

    /// Check values that would make rendering meaningless.
    pub fn validate(&self) -> Result<(), ProjectError> {
        if !self.playback_speed.is_finite() || self.playback_speed <= 0.0 {
            return Err(ProjectError::ValidationError {
                message: format!("playback_speed must be positive, got {}", self.playback_speed),
            });
        }
        if !self.overlap_secs.is_finite() || self.overlap_secs < 0.0 {
            return Err(ProjectError::ValidationError {
                message: format!("overlap_secs must be >= 0, got {}", self.overlap_secs),
            });
        }
        if self.segments.is_empty() {
            return Err(ProjectError::ValidationError {
                message: "project has no segments".to_string(),
            });
        }
        Ok(())
    }

    /// Rewrite every file reference through `resolve`.
    pub fn map_paths(&mut self, resolve: &dyn Fn(&Path) -> PathBuf) {
        if let Some(bgm) = &mut self.bgm {
            bgm.path = resolve(&bgm.path);
        }
        self.intro = self.intro.as_deref().map(resolve);
        self.default_background = self.default_background.as_deref().map(resolve);
        for profile in self.speakers.values_mut() {
            profile.video = profile.video.as_deref().map(resolve);
            for video in profile.moods.values_mut() {
                *video = resolve(video);
            }
        }
        for segment in &mut self.segments {
            segment.map_paths(resolve);
        }
    }
}

/// Resolve a project-relative asset path.
///
/// Absolute paths are returned unchanged. A relative path that does not exist
/// under `root` but starts with `assets/` is retried with that prefix removed,
/// since scripts exported from the editor carry it.
pub fn resolve_asset(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let joined = root.join(path);
    if joined.exists() {
        return joined;
    }
    match path.strip_prefix("assets") {
        Ok(stripped) if root.join(stripped).exists() => root.join(stripped),
        _ => joined,
    }
}

impl LoadedRenderProject {
    /// Load and normalize a project file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref().to_path_buf();
        let json = std::fs::read_to_string(&path).map_err(|e| ProjectError::IoError {
            path: path.clone(),
            source: e,
        })?;
        let mut project: RenderProject =
            serde_json::from_str(&json).map_err(|e| ProjectError::ParseError {
                path: path.clone(),
                source: e,
            })?;
        for segment in &mut project.segments {
            segment.normalize();
        }

        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            path,
            root,
            project,
        })
    }

    /// Save the project file back to disk.
    pub fn save(&self) -> Result<(), ProjectError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ProjectError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json =
            serde_json::to_string_pretty(&self.project).map_err(|e| ProjectError::ParseError {
                path: self.path.clone(),
                source: e,
            })?;
        std::fs::write(&self.path, json).map_err(|e| ProjectError::IoError {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Write a new starter project at `path`.
    pub fn create(
        path: impl AsRef<Path>,
        title: impl Into<String>,
        format: VideoFormat,
    ) -> Result<Self, ProjectError> {
        let path = path.as_ref().to_path_buf();
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let loaded = Self {
            path,
            root,
            project: RenderProject::starter(title, format),
        };
        loaded.save()?;
        Ok(loaded)
    }

    /// The project with every path made absolute (or root-relative).
    pub fn resolved(&self) -> RenderProject {
        let mut project = self.project.clone();
        let root = self.root.clone();
        project.map_paths(&move |p| resolve_asset(&root, p));
        project
    }

    /// Validate that all referenced source files exist.
    pub fn validate_sources(&self) -> Vec<String> {
        let project = self.resolved();
        let mut errors = vec![];

        let check = |label: &str, path: &Path, errors: &mut Vec<String>| {
            if !path.exists() {
                errors.push(format!("{label} missing: {}", path.display()));
            }
        };

        if let Some(bgm) = &project.bgm {
            check("BGM", &bgm.path, &mut errors);
        }
        if let Some(intro) = &project.intro {
            check("Intro", intro, &mut errors);
        }
        if let Some(bg) = &project.default_background {
            check("Default background", bg, &mut errors);
        }
        for (id, profile) in &project.speakers {
            if let Some(video) = &profile.video {
                check(&format!("Speaker '{id}' video"), video, &mut errors);
            }
            for (mood, video) in &profile.moods {
                check(&format!("Speaker '{id}' mood '{mood}'"), video, &mut errors);
            }
        }
        for (index, segment) in project.segments.iter().enumerate() {
            for (label, path) in segment.referenced_files() {
                check(&format!("Segment {index}: {label}"), path, &mut errors);
            }
            if let Segment::Speech(speech) = segment {
                if !speech.speaker.is_empty() && !project.speakers.contains_key(&speech.speaker) {
                    errors.push(format!(
                        "Segment {index}: unknown speaker '{}'",
                        speech.speaker
                    ));
                }
            }
        }

        errors
    }
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::InsertedVideo;

    const MINIMAL: &str = r#"{
        "title": "Episode 12",
        "format": "short",
        "playback_speed": 1.25,
        "speakers": { "host": { "video": "speakers/host.mp4", "moods": { "happy": "speakers/host_happy.mp4" } } },
        "segments": [
            { "type": "speech", "audio": "audio/001.wav", "speaker": "host", "text": "hi" },
            { "type": "insert_video", "path": "clips/a.mp4", "trim_start": "00:00:10", "trim_end": "00:00:12.500" },
            { "type": "section", "label": "Part 2", "duration": 2 }
        ]
    }"#;

    #[test]
    fn test_project_defaults() {
        let project: RenderProject = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(project.version, "1.0");
        assert_eq!(project.format, VideoFormat::Short);
        assert!(project.captions_enabled);
        assert_eq!(project.overlap_secs, 0.0);
        assert_eq!(project.segments.len(), 3);
        project.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_speed() {
        let mut project: RenderProject = serde_json::from_str(MINIMAL).unwrap();
        project.playback_speed = 0.0;
        assert!(matches!(
            project.validate(),
            Err(ProjectError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_speaker_mood_lookup() {
        let project: RenderProject = serde_json::from_str(MINIMAL).unwrap();
        let host = &project.speakers["host"];
        assert_eq!(
            host.video_for(Some("happy")),
            Some(Path::new("speakers/host_happy.mp4"))
        );
        assert_eq!(host.video_for(Some("sad")), Some(Path::new("speakers/host.mp4")));
        assert_eq!(host.video_for(None), Some(Path::new("speakers/host.mp4")));
    }

    #[test]
    fn test_load_resolves_against_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.json");
        std::fs::write(&path, MINIMAL).unwrap();

        let loaded = LoadedRenderProject::load(&path).unwrap();
        assert_eq!(loaded.root, dir.path());

        let resolved = loaded.resolved();
        match &resolved.segments[1] {
            Segment::InsertVideo(InsertedVideo {
                path,
                trim_start,
                trim_end,
                ..
            }) => {
                assert_eq!(path, &dir.path().join("clips/a.mp4"));
                assert_eq!(*trim_start, 10.0);
                assert_eq!(*trim_end, 12.5);
            }
            other => panic!("unexpected segment {other:?}"),
        }
    }

    #[test]
    fn test_resolve_asset_strips_assets_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/a.png"), b"png").unwrap();

        let resolved = resolve_asset(dir.path(), Path::new("assets/images/a.png"));
        assert_eq!(resolved, dir.path().join("images/a.png"));

        let missing = resolve_asset(dir.path(), Path::new("assets/images/b.png"));
        assert_eq!(missing, dir.path().join("assets/images/b.png"));
    }

    #[test]
    fn test_validate_sources_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.json");
        std::fs::write(&path, MINIMAL).unwrap();
        std::fs::create_dir_all(dir.path().join("audio")).unwrap();
        std::fs::write(dir.path().join("audio/001.wav"), b"wav").unwrap();

        let loaded = LoadedRenderProject::load(&path).unwrap();
        let errors = loaded.validate_sources();
        assert!(errors.iter().any(|e| e.contains("Inserted video missing")));
        assert!(errors.iter().any(|e| e.contains("Speaker 'host' video")));
        assert!(!errors.iter().any(|e| e.contains("Speech audio")));
    }

    #[test]
    fn test_create_writes_starter_project() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new/project.json");
        let created = LoadedRenderProject::create(&path, "Pilot", VideoFormat::Landscape).unwrap();
        assert_eq!(created.project.segments.len(), 2);

        let loaded = LoadedRenderProject::load(&path).unwrap();
        assert_eq!(loaded.project.title, "Pilot");
        assert!(loaded.project.speakers.contains_key("host"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = LoadedRenderProject::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
