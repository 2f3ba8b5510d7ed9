//! Timeline segment descriptors.
//!
//! A segment is one unit of the finished video. Segments are read from the
//! render project file and never mutated afterwards; resolved timing lives in
//! [`crate::timeline::TimedSegment`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use podreel_common::timecode::{normalize_trim_range, parse_timecode};

/// File extensions treated as video when a background could be either.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "mkv", "webm"];

/// Whether a path looks like a video file (by extension).
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// One timeline unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// A synthesized speech turn.
    Speech(SpeechSegment),
    /// An excerpt of a pre-recorded video.
    InsertVideo(InsertedVideo),
    /// A full-screen text card.
    Section(SectionCard),
}

/// A speech turn rendered over the speaker's looping video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSegment {
    /// Finished speech audio.
    pub audio: PathBuf,

    /// Subtitle text.
    #[serde(default)]
    pub text: String,

    /// Speaker id, looked up in the project's speaker table.
    #[serde(default)]
    pub speaker: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,

    /// Secondary image or video shown full-canvas behind the speaker overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_effect: Option<PathBuf>,

    /// Show a still frame of the speaker instead of the moving loop.
    #[serde(default)]
    pub echo: bool,

    /// Slow continuous zoom. Implied by `echo`.
    #[serde(default)]
    pub zoom: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<VisualEffect>,

    #[serde(default)]
    pub language: Language,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callout: Option<Callout>,

    /// Absolute timeline start requested by the script.
    #[serde(
        default,
        rename = "start",
        deserialize_with = "de_opt_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub requested_start: Option<f64>,

    /// Audio duration when already known (skips probing).
    #[serde(
        default,
        rename = "duration",
        deserialize_with = "de_opt_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub known_duration: Option<f64>,
}

/// A trimmed excerpt of an existing video file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertedVideo {
    pub path: PathBuf,

    #[serde(deserialize_with = "de_secs")]
    pub trim_start: f64,

    #[serde(deserialize_with = "de_secs")]
    pub trim_end: f64,

    #[serde(
        default,
        rename = "start",
        deserialize_with = "de_opt_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub requested_start: Option<f64>,
}

/// A full-screen text card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionCard {
    pub label: String,

    #[serde(default = "default_section_duration", deserialize_with = "de_secs")]
    pub duration: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_effect: Option<PathBuf>,
}

fn default_section_duration() -> f64 {
    1.0
}

/// Speaker-video effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualEffect {
    /// Desaturate.
    Gray,
    /// Screen-blend a blurred, pulsing copy over the source.
    Glow,
}

/// Subtitle language. Drives wrapping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    #[default]
    Japanese,
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Japanese => "ja",
            Self::English => "en",
        }
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("en") {
            Self::English
        } else {
            Self::Japanese
        }
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.code().to_string()
    }
}

/// How a callout appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutMode {
    /// Characters revealed one by one, then held.
    #[default]
    Typewriter,
    /// Fully shown for the whole clip.
    Static,
}

/// Decorative label shown top-center during a speech clip.
///
/// Accepts either a bare string (typewriter) or `{ "text", "mode" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CalloutRepr")]
pub struct Callout {
    pub text: String,
    pub mode: CalloutMode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CalloutRepr {
    Text(String),
    Full {
        text: String,
        #[serde(default)]
        mode: CalloutMode,
    },
}

impl From<CalloutRepr> for Callout {
    fn from(value: CalloutRepr) -> Self {
        match value {
            CalloutRepr::Text(text) => Self {
                text,
                mode: CalloutMode::Typewriter,
            },
            CalloutRepr::Full { text, mode } => Self { text, mode },
        }
    }
}

impl Segment {
    /// Short kind tag used in logs and scratch filenames.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Speech(_) => "speech",
            Self::InsertVideo(_) => "insert_video",
            Self::Section(_) => "section",
        }
    }

    pub fn requested_start(&self) -> Option<f64> {
        match self {
            Self::Speech(s) => s.requested_start,
            Self::InsertVideo(v) => v.requested_start,
            Self::Section(_) => None,
        }
    }

    pub fn as_speech(&self) -> Option<&SpeechSegment> {
        match self {
            Self::Speech(s) => Some(s),
            _ => None,
        }
    }

    /// Force invariants the script layer is allowed to violate.
    pub fn normalize(&mut self) {
        match self {
            Self::InsertVideo(v) => {
                let (start, end) = normalize_trim_range(v.trim_start, v.trim_end);
                v.trim_start = start;
                v.trim_end = end;
            }
            Self::Section(s) => {
                if !s.duration.is_finite() || s.duration <= 0.0 {
                    s.duration = default_section_duration();
                }
            }
            Self::Speech(_) => {}
        }
    }

    /// Rewrite every file reference through `resolve`.
    pub fn map_paths(&mut self, resolve: &dyn Fn(&Path) -> PathBuf) {
        match self {
            Self::Speech(s) => {
                s.audio = resolve(&s.audio);
                s.background = s.background.as_deref().map(resolve);
                s.sound_effect = s.sound_effect.as_deref().map(resolve);
            }
            Self::InsertVideo(v) => v.path = resolve(&v.path),
            Self::Section(s) => s.sound_effect = s.sound_effect.as_deref().map(resolve),
        }
    }

    /// All files this segment references, labelled for diagnostics.
    pub fn referenced_files(&self) -> Vec<(&'static str, &Path)> {
        let mut files = Vec::new();
        match self {
            Self::Speech(s) => {
                files.push(("Speech audio", s.audio.as_path()));
                if let Some(bg) = &s.background {
                    files.push(("Background", bg.as_path()));
                }
                if let Some(se) = &s.sound_effect {
                    files.push(("Sound effect", se.as_path()));
                }
            }
            Self::InsertVideo(v) => files.push(("Inserted video", v.path.as_path())),
            Self::Section(s) => {
                if let Some(se) = &s.sound_effect {
                    files.push(("Sound effect", se.as_path()));
                }
            }
        }
        files
    }
}

impl SpeechSegment {
    /// Zoom applies when requested or when the clip is an echo still.
    pub fn wants_zoom(&self) -> bool {
        self.zoom || self.echo
    }
}

impl InsertedVideo {
    pub fn trim_duration(&self) -> f64 {
        (self.trim_end - self.trim_start).max(0.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimeRepr {
    Secs(f64),
    Text(String),
}

impl TimeRepr {
    fn into_secs(self) -> Option<f64> {
        match self {
            Self::Secs(v) => (v.is_finite() && v >= 0.0).then_some(v),
            Self::Text(s) => parse_timecode(&s),
        }
    }
}

fn de_opt_secs<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<TimeRepr> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(TimeRepr::into_secs))
}

fn de_secs<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    TimeRepr::deserialize(deserializer)?
        .into_secs()
        .ok_or_else(|| serde::de::Error::custom("expected seconds or an HH:MM:SS timecode"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_segment_parses_timecode_start() {
        let json = r#"{
            "type": "speech",
            "audio": "audio/001.wav",
            "text": "hello",
            "speaker": "host",
            "start": "00:00:03",
            "callout": "Intro"
        }"#;
        let segment: Segment = serde_json::from_str(json).unwrap();
        let speech = segment.as_speech().unwrap();
        assert_eq!(speech.requested_start, Some(3.0));
        assert_eq!(speech.language, Language::Japanese);
        assert_eq!(
            speech.callout,
            Some(Callout {
                text: "Intro".into(),
                mode: CalloutMode::Typewriter
            })
        );
        assert_eq!(segment.kind(), "speech");
    }

    #[test]
    fn test_callout_object_form() {
        let json = r#"{ "text": "Label", "mode": "static" }"#;
        let callout: Callout = serde_json::from_str(json).unwrap();
        assert_eq!(callout.mode, CalloutMode::Static);
    }

    #[test]
    fn test_insert_video_normalizes_inverted_trim() {
        let json = r#"{ "type": "insert_video", "path": "clip.mp4",
                        "trim_start": "00:00:10", "trim_end": 4 }"#;
        let mut segment: Segment = serde_json::from_str(json).unwrap();
        segment.normalize();
        match segment {
            Segment::InsertVideo(v) => {
                assert_eq!(v.trim_start, 10.0);
                assert_eq!(v.trim_end, 11.0);
                assert_eq!(v.trim_duration(), 1.0);
            }
            other => panic!("unexpected segment {other:?}"),
        }
    }

    #[test]
    fn test_section_defaults_to_one_second() {
        let segment: Segment =
            serde_json::from_str(r#"{ "type": "section", "label": "Part 2" }"#).unwrap();
        match segment {
            Segment::Section(s) => assert_eq!(s.duration, 1.0),
            other => panic!("unexpected segment {other:?}"),
        }
    }

    #[test]
    fn test_invalid_requested_start_is_ignored() {
        let json = r#"{ "type": "speech", "audio": "a.wav", "start": "soon" }"#;
        let segment: Segment = serde_json::from_str(json).unwrap();
        assert_eq!(segment.requested_start(), None);
    }

    #[test]
    fn test_english_language_tag() {
        let json = r#"{ "type": "speech", "audio": "a.wav", "language": "EN" }"#;
        let segment: Segment = serde_json::from_str(json).unwrap();
        assert_eq!(segment.as_speech().unwrap().language, Language::English);
    }

    #[test]
    fn test_is_video_path() {
        assert!(is_video_path(Path::new("bg/loop.MP4")));
        assert!(is_video_path(Path::new("a.webm")));
        assert!(!is_video_path(Path::new("bg/still.png")));
        assert!(!is_video_path(Path::new("noext")));
    }

    #[test]
    fn test_echo_implies_zoom() {
        let json = r#"{ "type": "speech", "audio": "a.wav", "echo": true }"#;
        let segment: Segment = serde_json::from_str(json).unwrap();
        assert!(segment.as_speech().unwrap().wants_zoom());
    }
}
