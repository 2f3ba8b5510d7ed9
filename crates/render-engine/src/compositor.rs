//! Video composition for speech clips.
//!
//! Each function returns filter chains between named pads; the speech
//! renderer wires them together. Nothing here touches the filesystem.

use std::path::Path;

use podreel_processing_core::ZoomConfig;
use podreel_project_model::layout::Layout;
use podreel_project_model::segment::VisualEffect;

use crate::graph::{num, Filter, FilterChain};

/// Flat black canvas of the output size at the output frame rate.
pub fn base_canvas(layout: &Layout, fps: u32, duration_secs: f64, out: &str) -> FilterChain {
    FilterChain::new()
        .then(
            Filter::new("color")
                .arg("c", "black")
                .arg("s", layout.size_arg())
                .arg("r", fps)
                .arg("d", num(duration_secs)),
        )
        .output(out)
}

/// Scale to cover the canvas, then crop the overflow.
pub fn cover_filters(layout: &Layout) -> Vec<Filter> {
    vec![
        Filter::new("scale")
            .pos(layout.width)
            .pos(layout.height)
            .arg("force_original_aspect_ratio", "increase"),
        Filter::new("crop").pos(layout.width).pos(layout.height),
        Filter::new("setsar").pos(1),
    ]
}

/// Scale a secondary background to fill the canvas.
pub fn fill_background(input: &str, layout: &Layout, out: &str) -> FilterChain {
    FilterChain::link(input, out).then_all(cover_filters(layout))
}

/// Fit the speaker video as the main picture.
///
/// Landscape output letterboxes; vertical output fills and crops.
pub fn fit_speaker(input: &str, layout: &Layout, out: &str) -> FilterChain {
    let chain = FilterChain::link(input, out);
    if layout.is_vertical() {
        chain.then_all(cover_filters(layout))
    } else {
        chain
            .then(
                Filter::new("scale")
                    .pos(layout.width)
                    .pos(layout.height)
                    .arg("force_original_aspect_ratio", "decrease"),
            )
            .then(Filter::new("setsar").pos(1))
    }
}

/// Square-crop the speaker video and mask it to a circle.
pub fn circular_pip(input: &str, diameter: u32, out: &str) -> FilterChain {
    let side = "min(iw\\,ih)";
    let alpha = "if(gt(sqrt(pow(X-(W/2),2)+pow(Y-(H/2),2)),min(W,H)/2),0,alpha(X,Y))";
    FilterChain::link(input, out)
        .then(
            Filter::new("scale")
                .pos(diameter)
                .pos(diameter)
                .arg("force_original_aspect_ratio", "decrease"),
        )
        .then(
            Filter::new("crop")
                .pos(side)
                .pos(side)
                .pos(format!("(iw-{side})/2"))
                .pos(format!("(ih-{side})/2")),
        )
        .then(Filter::new("format").pos("rgba"))
        .then(
            Filter::new("geq")
                .quoted("r", "r(X,Y)")
                .quoted("g", "g(X,Y)")
                .quoted("b", "b(X,Y)")
                .quoted("a", alpha),
        )
}

/// Overlay `top` on `base` at `x`/`y`.
pub fn overlay(base: &str, top: &str, x: &str, y: &str, out: &str) -> FilterChain {
    FilterChain::link(base, out)
        .input(top)
        .then(Filter::new("overlay").pos(x).pos(y))
}

/// Overlay `top` centered on `base`.
pub fn overlay_centered(base: &str, top: &str, out: &str) -> FilterChain {
    overlay(
        base,
        top,
        "(main_w-overlay_w)/2",
        "(main_h-overlay_h)/2",
        out,
    )
}

/// Chains applying a visual effect from `input` to `out`.
pub fn effect_chains(input: &str, effect: VisualEffect, out: &str) -> Vec<FilterChain> {
    match effect {
        VisualEffect::Gray => {
            vec![FilterChain::link(input, out).then(Filter::new("hue").arg("s", 0))]
        }
        VisualEffect::Glow => {
            let (plain, blurred, glow) = ("glow_src", "glow_blur_in", "glow_layer");
            vec![
                FilterChain::new()
                    .input(input)
                    .then(Filter::new("split"))
                    .output(plain)
                    .output(blurred),
                FilterChain::link(blurred, glow)
                    .then(Filter::new("gblur").arg("sigma", 20).arg("steps", 3))
                    .then(Filter::new("hue").arg("s", 0))
                    .then(
                        Filter::new("eq")
                            .arg("contrast", "2.0")
                            .quoted("brightness", "-0.1+0.1*sin(2*PI*t/1)")
                            .arg("eval", "frame"),
                    ),
                FilterChain::link(plain, out).input(glow).then(
                    Filter::new("blend")
                        .arg("c0_mode", "screen")
                        .quoted("c1_expr", "A")
                        .quoted("c2_expr", "A"),
                ),
            ]
        }
    }
}

/// Slow push-in on a speaker input, starting at `start_zoom`.
///
/// The frame is upscaled 2x before `zoompan` and scaled back afterwards so
/// small zoom steps do not jitter. A still input emits the whole clip from
/// its first frame. Moving video is locked to `zoom.fps` first and emits one
/// frame per input frame, so `zoom` keeps growing across frames.
pub fn zoom_chain(
    input: &str,
    layout: &Layout,
    zoom: &ZoomConfig,
    start_zoom: f64,
    frames: u64,
    still: bool,
    out: &str,
) -> FilterChain {
    let (w2, h2) = (layout.width * 2, layout.height * 2);
    let z = format!(
        "min(if(eq(on,0),{},zoom+{}),{})",
        num(start_zoom),
        num(zoom.step_per_frame),
        num(zoom.max_zoom)
    );
    let mut chain = FilterChain::link(input, out);
    if !still {
        chain = chain.then(Filter::new("fps").pos(zoom.fps));
    }
    let per_input = if still { frames + 100 } else { 1 };
    chain
        .then(Filter::new("scale").pos(w2).pos(h2))
        .then(
            Filter::new("zoompan")
                .quoted("z", z)
                .quoted("x", "iw/2-(iw/zoom/2)")
                .quoted("y", "ih/2-(ih/zoom/2)")
                .arg("d", per_input)
                .arg("s", format!("{w2}x{h2}"))
                .arg("fps", zoom.fps),
        )
        .then(Filter::new("scale").pos(layout.width).pos(layout.height))
}

/// Burned-in subtitle: translucent box plus centered bordered text.
pub fn subtitle_chain(
    input: &str,
    layout: &Layout,
    text_file: &Path,
    font_file: &Path,
    out: &str,
) -> FilterChain {
    let boxes = &layout.subtitles;
    let ratio = num(boxes.max_width_ratio);
    let top = format!("ih-{}-{}", boxes.box_height, boxes.bottom_margin);
    FilterChain::link(input, out)
        .then(
            Filter::new("drawbox")
                .arg("x", format!("(iw-{ratio}*iw)/2"))
                .arg("y", &top)
                .arg("w", format!("{ratio}*iw"))
                .arg("h", boxes.box_height)
                .arg("color", "black@0.5")
                .arg("t", "fill"),
        )
        .then(
            Filter::new("drawtext")
                .path(Some("textfile"), text_file)
                .path(Some("fontfile"), font_file)
                .arg("fontsize", boxes.font_size)
                .arg("expansion", "none")
                .arg("fontcolor", "white")
                .arg("x", "(w-text_w)/2")
                .arg(
                    "y",
                    format!(
                        "h-{}-{}+({}-th)/2",
                        boxes.box_height, boxes.bottom_margin, boxes.box_height
                    ),
                )
                .arg("borderw", 2)
                .arg("bordercolor", "black"),
        )
}

/// Centered text card, used by section clips.
pub fn title_card_chain(
    input: &str,
    text_file: &Path,
    font_file: &Path,
    font_size: u32,
    out: &str,
) -> FilterChain {
    FilterChain::link(input, out)
        .then(
            Filter::new("drawtext")
                .path(Some("textfile"), text_file)
                .path(Some("fontfile"), font_file)
                .arg("fontsize", font_size)
                .arg("expansion", "none")
                .arg("fontcolor", "white")
                .arg("x", "(w-text_w)/2")
                .arg("y", "(h-text_h)/2")
                .arg("line_spacing", 20),
        )
        .then(Filter::new("format").pos("yuv420p"))
}

/// Burn an ASS callout track.
pub fn callout_chain(input: &str, ass_file: &Path, fonts_dir: &Path, out: &str) -> FilterChain {
    FilterChain::link(input, out).then(
        Filter::new("subtitles")
            .path(None, ass_file)
            .path(Some("fontsdir"), fonts_dir),
    )
}

/// Final video trim to the clip length.
pub fn trim_chain(input: &str, duration_secs: f64, out: &str) -> FilterChain {
    FilterChain::link(input, out)
        .then(Filter::new("trim").arg("duration", num(duration_secs)))
        .then(Filter::new("setpts").pos("PTS-STARTPTS"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use podreel_project_model::layout::VideoFormat;

    fn landscape() -> Layout {
        Layout::for_format(VideoFormat::Landscape)
    }

    #[test]
    fn test_base_canvas() {
        assert_eq!(
            base_canvas(&landscape(), 30, 2.05, "base").to_string(),
            "color=c=black:s=1920x1080:r=30:d=2.05[base]"
        );
    }

    #[test]
    fn test_fit_speaker_depends_on_orientation() {
        assert_eq!(
            fit_speaker("1:v", &landscape(), "spk").to_string(),
            "[1:v]scale=1920:1080:force_original_aspect_ratio=decrease,setsar=1[spk]"
        );
        let short = Layout::for_format(VideoFormat::Short);
        assert_eq!(
            fit_speaker("1:v", &short, "spk").to_string(),
            "[1:v]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,setsar=1[spk]"
        );
    }

    #[test]
    fn test_circular_pip_mask() {
        let text = circular_pip("1:v", 675, "pip").to_string();
        assert!(text.starts_with("[1:v]scale=675:675:force_original_aspect_ratio=decrease,"));
        assert!(text.contains("crop=min(iw\\,ih):min(iw\\,ih):(iw-min(iw\\,ih))/2:(ih-min(iw\\,ih))/2"));
        assert!(text.contains("format=rgba,geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':a='if(gt("));
        assert!(text.ends_with("[pip]"));
    }

    #[test]
    fn test_gray_effect() {
        let chains = effect_chains("comp", VisualEffect::Gray, "fx");
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].to_string(), "[comp]hue=s=0[fx]");
    }

    #[test]
    fn test_glow_effect_blends_blurred_copy() {
        let text: Vec<String> = effect_chains("comp", VisualEffect::Glow, "fx")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(text[0], "[comp]split[glow_src][glow_blur_in]");
        assert!(text[1].contains("gblur=sigma=20:steps=3,hue=s=0,eq=contrast=2.0:brightness='-0.1+0.1*sin(2*PI*t/1)':eval=frame"));
        assert_eq!(
            text[2],
            "[glow_src][glow_layer]blend=c0_mode=screen:c1_expr='A':c2_expr='A'[fx]"
        );
    }

    #[test]
    fn test_zoom_chain_on_still_emits_whole_clip() {
        let text = zoom_chain("2:v", &landscape(), &ZoomConfig::default(), 1.031, 60, true, "zoomed")
            .to_string();
        assert_eq!(
            text,
            "[2:v]scale=3840:2160,zoompan=z='min(if(eq(on,0),1.031,zoom+0.0005),2)':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=160:s=3840x2160:fps=30,scale=1920:1080[zoomed]"
        );
    }

    #[test]
    fn test_zoom_chain_on_video_is_frame_locked() {
        let text = zoom_chain("1:v", &landscape(), &ZoomConfig::default(), 1.0, 60, false, "zoomed")
            .to_string();
        assert_eq!(
            text,
            "[1:v]fps=30,scale=3840:2160,zoompan=z='min(if(eq(on,0),1,zoom+0.0005),2)':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s=3840x2160:fps=30,scale=1920:1080[zoomed]"
        );
        assert!(!text.contains("d=160"));
    }

    #[test]
    fn test_subtitle_chain_geometry() {
        let text = subtitle_chain(
            "v0",
            &landscape(),
            Path::new("/tmp/sub.txt"),
            Path::new("fonts/Noto.ttf"),
            "v1",
        )
        .to_string();
        assert!(text.contains("drawbox=x=(iw-0.8*iw)/2:y=ih-135-80:w=0.8*iw:h=135:color=black@0.5:t=fill"));
        assert!(text.contains("drawtext=textfile='/tmp/sub.txt':fontfile='fonts/Noto.ttf':fontsize=48"));
        assert!(text.contains("y=h-135-80+(135-th)/2:borderw=2:bordercolor=black[v1]"));
    }

    #[test]
    fn test_callout_chain_escapes_paths() {
        let text = callout_chain(
            "v1",
            Path::new("/tmp/a:b.ass"),
            Path::new("fonts"),
            "v2",
        )
        .to_string();
        assert_eq!(text, "[v1]subtitles='/tmp/a\\:b.ass':fontsdir='fonts'[v2]");
    }

    #[test]
    fn test_trim_chain() {
        assert_eq!(
            trim_chain("v2", 2.05, "v").to_string(),
            "[v2]trim=duration=2.05,setpts=PTS-STARTPTS[v]"
        );
    }
}
