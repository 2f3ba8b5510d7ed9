//! Output format geometry.
//!
//! Each output format maps to one fixed [`Layout`]: canvas size, the burned-in
//! subtitle box, the top callout box, and where the circular speaker overlay
//! sits. PiP anchors are ffmpeg overlay expressions evaluated against the
//! main and overlay sizes.

use serde::{Deserialize, Serialize};

/// Output video format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VideoFormat {
    /// 16:9 widescreen, 1920x1080.
    #[default]
    Landscape,
    /// 9:16 vertical, 1080x1920.
    Short,
}

impl VideoFormat {
    /// Resolve a format tag. Unknown tags fall back to landscape.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "short" | "shorts" | "vertical" | "portrait" => Self::Short,
            _ => Self::Landscape,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Short => "short",
        }
    }
}

impl From<String> for VideoFormat {
    fn from(value: String) -> Self {
        Self::from_tag(&value)
    }
}

impl From<VideoFormat> for String {
    fn from(value: VideoFormat) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Burned-in subtitle box geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubtitleBox {
    /// Box width as a fraction of canvas width.
    pub max_width_ratio: f64,
    pub font_size: u32,
    pub box_height: u32,
    /// Distance from the canvas bottom to the box bottom.
    pub bottom_margin: u32,
}

/// Top-center callout geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalloutBox {
    pub max_width_ratio: f64,
    pub font_size: u32,
    pub margin_x: u32,
    pub margin_y: u32,
}

/// Circular speaker overlay placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipPlacement {
    /// Diameter of the circular mask in pixels.
    pub diameter: u32,
    /// Overlay x expression (may reference `main_w`, `overlay_w`).
    pub x: &'static str,
    /// Overlay y expression (may reference `main_h`, `overlay_h`).
    pub y: &'static str,
}

/// Complete geometry for one output format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
    pub subtitles: SubtitleBox,
    pub callout: CalloutBox,
    pub pip: PipPlacement,
}

const LANDSCAPE: Layout = Layout {
    format: VideoFormat::Landscape,
    width: 1920,
    height: 1080,
    subtitles: SubtitleBox {
        max_width_ratio: 0.8,
        font_size: 48,
        box_height: 135,
        bottom_margin: 80,
    },
    callout: CalloutBox {
        max_width_ratio: 0.9,
        font_size: 160,
        margin_x: 60,
        margin_y: 70,
    },
    pip: PipPlacement {
        diameter: 675,
        x: "1500",
        y: "650",
    },
};

const SHORT: Layout = Layout {
    format: VideoFormat::Short,
    width: 1080,
    height: 1920,
    subtitles: SubtitleBox {
        max_width_ratio: 0.92,
        font_size: 48,
        box_height: 150,
        bottom_margin: 140,
    },
    callout: CalloutBox {
        max_width_ratio: 0.92,
        font_size: 220,
        margin_x: 40,
        margin_y: 90,
    },
    pip: PipPlacement {
        diameter: 1100,
        x: "(main_w-overlay_w)/2",
        y: "(main_h-overlay_h)-400",
    },
};

impl Layout {
    /// Geometry for an output format.
    pub fn for_format(format: VideoFormat) -> Self {
        match format {
            VideoFormat::Landscape => LANDSCAPE,
            VideoFormat::Short => SHORT,
        }
    }

    /// Geometry for a raw format tag (unknown tags resolve to landscape).
    pub fn for_tag(tag: &str) -> Self {
        Self::for_format(VideoFormat::from_tag(tag))
    }

    /// `WxH` as used by ffmpeg size options.
    pub fn size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn is_vertical(&self) -> bool {
        self.height > self.width
    }
}
