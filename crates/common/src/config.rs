//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the ffmpeg binary.
pub const FFMPEG_ENV: &str = "PODREEL_FFMPEG";

/// Environment variable overriding the ffprobe binary.
pub const FFPROBE_ENV: &str = "PODREEL_FFPROBE";

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scratch root for intermediate clips.
    pub work_dir: PathBuf,

    /// Directory where finished videos are written.
    pub output_dir: PathBuf,

    /// External tool locations.
    pub tools: ToolPaths,

    /// Clip rendering parameters.
    pub render: RenderDefaults,

    /// Final encode parameters.
    pub encode: EncodeDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Paths to the external transcoder binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Which pipeline stage applies the global playback speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedStage {
    /// Each speech clip is retimed while it is rendered.
    #[default]
    PerSegment,
    /// Clips are rendered at 1x and the final encode retimes everything.
    FinalEncode,
}

/// Default clip rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Output frame rate for every clip.
    pub fps: u32,

    /// Maximum number of inputs handed to a single concat pass.
    pub max_clips_per_concat: usize,

    /// Timeline gaps at or below this many seconds are not filled.
    pub gap_threshold_secs: f64,

    /// Padding added to every speech clip to absorb rounding.
    pub clip_epsilon_secs: f64,

    /// Linear gain applied to speech audio.
    pub speech_gain: f64,

    /// BGM gain used when the project does not set one.
    pub default_bgm_volume: f64,

    /// Where the global playback speed is applied.
    pub speed_stage: SpeedStage,

    /// Font file used for burned-in subtitles and section cards.
    pub subtitle_font: PathBuf,

    /// Font family name used by callout cue tracks.
    pub callout_font: String,

    /// Directory searched by libass for the callout font.
    pub fonts_dir: PathBuf,
}

/// Final distribution encode parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeDefaults {
    /// x264 preset for the final pass.
    pub preset: String,

    /// Video bitrate in kb/s.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kb/s.
    pub audio_bitrate_kbps: u32,

    /// Fixed GOP length in frames.
    pub keyframe_interval: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "podreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("podreel"),
            output_dir: dirs_default_output(),
            tools: ToolPaths::default(),
            render: RenderDefaults::default(),
            encode: EncodeDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            max_clips_per_concat: 500,
            gap_threshold_secs: 0.01,
            clip_epsilon_secs: 0.05,
            speech_gain: 2.5,
            default_bgm_volume: 0.2,
            speed_stage: SpeedStage::PerSegment,
            subtitle_font: PathBuf::from("fonts/NotoSansJP-Bold.ttf"),
            callout_font: "Reggae One".to_string(),
            fonts_dir: PathBuf::from("fonts"),
        }
    }
}

impl Default for EncodeDefaults {
    fn default() -> Self {
        Self {
            preset: "fast".to_string(),
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 256,
            keyframe_interval: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    ///
    /// Tool paths from the environment always win over the file.
    pub fn load() -> Self {
        let config_path = config_file_path();
        let mut config = Self::default();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(parsed) => config = parsed,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        config.tools.apply_env_overrides();
        config
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

impl ToolPaths {
    /// Replace binary paths with `PODREEL_FFMPEG` / `PODREEL_FFPROBE` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = env_path(FFMPEG_ENV) {
            self.ffmpeg = path;
        }
        if let Some(path) = env_path(FFPROBE_ENV) {
            self.ffprobe = path;
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("podreel").join("config.json")
}

/// Default output directory.
fn dirs_default_output() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join("Videos").join("podreel")
}
