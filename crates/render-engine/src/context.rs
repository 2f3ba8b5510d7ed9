//! Shared inputs for the clip renderers.

use std::path::{Path, PathBuf};

use podreel_common::config::RenderDefaults;
use podreel_common::error::PodreelResult;
use podreel_processing_core::{SpeedPlan, ZoomConfig};
use podreel_project_model::layout::Layout;

use crate::ffmpeg::{FfmpegInvocation, MediaProbe, Transcoder};
use crate::progress::CancelToken;
use crate::scratch::{ScratchDir, TempFiles};

/// Everything a renderer needs besides the segment itself.
pub struct RenderContext<'a> {
    pub layout: Layout,
    pub render: &'a RenderDefaults,
    pub plan: SpeedPlan,
    pub zoom: ZoomConfig,
    pub captions: bool,
    pub transcoder: &'a dyn Transcoder,
    pub probe: &'a dyn MediaProbe,
    pub scratch: &'a ScratchDir,
    pub cancel: &'a CancelToken,
}

impl RenderContext<'_> {
    /// Run one invocation, honoring cancellation first.
    pub fn run(
        &self,
        invocation: &FfmpegInvocation,
        on_progress: &mut dyn FnMut(f64),
    ) -> PodreelResult<()> {
        self.cancel.check()?;
        self.transcoder.run(invocation, on_progress)
    }

    /// Run without progress reporting.
    pub fn run_quiet(&self, invocation: &FfmpegInvocation) -> PodreelResult<()> {
        self.run(invocation, &mut |_| {})
    }

    pub fn fps(&self) -> u32 {
        self.render.fps.max(1)
    }

    /// Write a helper file into the scratch dir and track it for cleanup.
    pub fn write_scratch(
        &self,
        temps: &mut TempFiles,
        stem: &str,
        extension: &str,
        content: &str,
    ) -> PodreelResult<PathBuf> {
        let path = self.scratch.file_path(stem, extension);
        std::fs::write(&path, content)?;
        temps.track(&path);
        Ok(path)
    }

    /// `Some(path)` when the optional asset exists, otherwise warn.
    pub fn optional_asset<'p>(&self, kind: &str, path: Option<&'p Path>) -> Option<&'p Path> {
        let path = path?;
        if path.exists() {
            Some(path)
        } else {
            tracing::warn!(kind, path = %path.display(), "Asset not found, continuing without it");
            None
        }
    }

    /// Encoder flags shared by every intermediate clip.
    pub fn intermediate_video_args(&self, crf: u32) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "ultrafast".to_string(),
            "-crf".to_string(),
            crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            self.fps().to_string(),
        ]
    }

    /// AAC 44.1 kHz stereo, with an explicit bitrate when given.
    pub fn intermediate_audio_args(&self, bitrate_kbps: Option<u32>) -> Vec<String> {
        let mut args: Vec<String> = ["-c:a", "aac"].iter().map(|s| s.to_string()).collect();
        if let Some(kbps) = bitrate_kbps {
            args.push("-b:a".into());
            args.push(format!("{kbps}k"));
        }
        args.extend(["-ar", "44100", "-ac", "2"].iter().map(|s| s.to_string()));
        args
    }
}
