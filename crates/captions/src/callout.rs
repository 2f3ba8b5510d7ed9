//! Callout cue tracks.
//!
//! A callout is the large decorative label at the top of a speech clip. It is
//! rendered by libass from a generated ASS script: one `Callout` style
//! anchored top-center, and either a single dialogue line (static) or one
//! line per revealed prefix followed by a hold line (typewriter).

use podreel_project_model::layout::Layout;
use podreel_project_model::segment::{Callout, CalloutMode, Language};

use crate::wrap::{callout_chars_per_line, callout_margin_x, normalize_callout_text, wrap_text};

/// Reveal speed for the typewriter effect.
pub const TYPEWRITER_SECS_PER_CHAR: f64 = 0.06;
pub const TYPEWRITER_MIN_REVEAL_SECS: f64 = 0.4;
pub const TYPEWRITER_MAX_REVEAL_SECS: f64 = 4.0;

/// Style parameters for the callout track.
#[derive(Debug, Clone, PartialEq)]
pub struct CalloutStyle {
    pub font_name: String,
    pub font_size: u32,
    pub margin_x: u32,
    pub margin_y: u32,
}

/// One timed ASS dialogue line, in centiseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct AssDialogue {
    pub start_cs: u64,
    pub end_cs: u64,
    pub text: String,
}

/// A complete callout script.
#[derive(Debug, Clone, PartialEq)]
pub struct CalloutTrack {
    pub play_res_x: u32,
    pub play_res_y: u32,
    pub style: CalloutStyle,
    pub dialogues: Vec<AssDialogue>,
}

impl CalloutTrack {
    /// Build the track for a callout shown during a clip of `clip_secs`.
    ///
    /// Returns `None` when the callout text is empty.
    pub fn build(
        callout: &Callout,
        language: Language,
        layout: &Layout,
        font_name: &str,
        clip_secs: f64,
    ) -> Option<Self> {
        let text = normalize_callout_text(&callout.text);
        if text.is_empty() {
            return None;
        }
        let wrapped = wrap_text(&text, callout_chars_per_line(layout, language), language);

        let total_secs = if clip_secs.is_finite() {
            clip_secs.max(0.05)
        } else {
            0.05
        };
        let total_cs = ((total_secs * 100.0).round() as u64).max(1);

        let dialogues = match callout.mode {
            CalloutMode::Static => vec![AssDialogue {
                start_cs: 0,
                end_cs: total_cs,
                text: wrapped,
            }],
            CalloutMode::Typewriter => typewriter_dialogues(&wrapped, total_secs, total_cs),
        };
        if dialogues.is_empty() {
            return None;
        }

        Some(Self {
            play_res_x: layout.width,
            play_res_y: layout.height,
            style: CalloutStyle {
                font_name: font_name.to_string(),
                font_size: layout.callout.font_size,
                margin_x: callout_margin_x(layout, language),
                margin_y: layout.callout.margin_y,
            },
            dialogues,
        })
    }

    /// Serialize as an ASS v4+ script.
    pub fn to_ass(&self) -> String {
        let style = &self.style;
        let mut lines = vec![
            "[Script Info]".to_string(),
            "ScriptType: v4.00+".to_string(),
            format!("PlayResX: {}", self.play_res_x),
            format!("PlayResY: {}", self.play_res_y),
            "ScaledBorderAndShadow: yes".to_string(),
            String::new(),
            "[V4+ Styles]".to_string(),
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding".to_string(),
            // White fill, black outline 5, shadow 3, top-center.
            format!(
                "Style: Callout,{},{},&H00FFFFFF,&H00FFFFFF,&H00000000,&H80000000,0,0,0,0,100,100,0,0,1,5,3,8,{},{},{},1",
                style.font_name, style.font_size, style.margin_x, style.margin_x, style.margin_y
            ),
            String::new(),
            "[Events]".to_string(),
            "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
                .to_string(),
        ];
        for dialogue in &self.dialogues {
            lines.push(format!(
                "Dialogue: 0,{},{},Callout,,0,0,0,,{}",
                format_ass_time(dialogue.start_cs),
                format_ass_time(dialogue.end_cs),
                escape_ass_text(&dialogue.text)
            ));
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

fn typewriter_dialogues(wrapped: &str, total_secs: f64, total_cs: u64) -> Vec<AssDialogue> {
    let chars: Vec<char> = wrapped.chars().collect();
    let count = chars.len();
    if count == 0 {
        return vec![];
    }

    let max_reveal = TYPEWRITER_MAX_REVEAL_SECS.min(total_secs * 0.9);
    let mut reveal = (count as f64 * TYPEWRITER_SECS_PER_CHAR)
        .max(TYPEWRITER_MIN_REVEAL_SECS)
        .min(max_reveal);
    if !reveal.is_finite() || reveal <= 0.0 {
        reveal = total_secs.min(1.2);
    }
    reveal = reveal.min(total_secs);
    let reveal_cs = ((reveal * 100.0).round() as u64).max(1);

    let mut dialogues = Vec::with_capacity(count + 1);
    for i in 1..=count {
        let start_cs = ((i as u64 - 1) * reveal_cs) as f64 / count as f64;
        let start_cs = start_cs.round() as u64;
        let mut end_cs = ((i as u64 * reveal_cs) as f64 / count as f64).round() as u64;
        if end_cs <= start_cs {
            end_cs = start_cs + 1;
        }
        if start_cs >= total_cs {
            break;
        }
        dialogues.push(AssDialogue {
            start_cs,
            end_cs: end_cs.min(total_cs),
            text: chars[..i].iter().collect(),
        });
    }

    if reveal_cs < total_cs {
        dialogues.push(AssDialogue {
            start_cs: reveal_cs,
            end_cs: total_cs,
            text: wrapped.to_string(),
        });
    }
    dialogues
}

/// Format centiseconds as `H:MM:SS.cc`.
pub fn format_ass_time(cs: u64) -> String {
    let hours = cs / 360_000;
    let minutes = (cs % 360_000) / 6_000;
    let seconds = (cs % 6_000) / 100;
    let centis = cs % 100;
    format!("{hours}:{minutes:02}:{seconds:02}.{centis:02}")
}

/// Escape override braces, backslashes, and line breaks for a dialogue line.
pub fn escape_ass_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => out.push_str("\\N"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use podreel_project_model::layout::VideoFormat;

    fn callout(text: &str, mode: CalloutMode) -> Callout {
        Callout {
            text: text.to_string(),
            mode,
        }
    }

    #[test]
    fn test_ass_time_format() {
        assert_eq!(format_ass_time(0), "0:00:00.00");
        assert_eq!(format_ass_time(12_345), "0:02:03.45");
        assert_eq!(format_ass_time(360_000), "1:00:00.00");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_ass_text("a{b}\\c\nd"), "a\\{b\\}\\\\c\\Nd");
        assert_eq!(escape_ass_text("x\r\ny"), "x\\Ny");
    }

    #[test]
    fn test_static_callout_single_line() {
        let layout = Layout::for_format(VideoFormat::Landscape);
        let track = CalloutTrack::build(
            &callout("Hello", CalloutMode::Static),
            Language::English,
            &layout,
            "Reggae One",
            3.0,
        )
        .unwrap();
        assert_eq!(track.dialogues.len(), 1);
        assert_eq!(track.dialogues[0].end_cs, 300);
        let ass = track.to_ass();
        assert!(ass.contains("PlayResX: 1920"));
        assert!(ass.contains("Style: Callout,Reggae One,160,"));
        assert!(ass.contains("Dialogue: 0,0:00:00.00,0:00:03.00,Callout,,0,0,0,,Hello"));
    }

    #[test]
    fn test_typewriter_reveals_prefixes_then_holds() {
        let layout = Layout::for_format(VideoFormat::Landscape);
        let track = CalloutTrack::build(
            &callout("Hello", CalloutMode::Typewriter),
            Language::English,
            &layout,
            "Reggae One",
            3.0,
        )
        .unwrap();
        // 5 chars * 0.06 = 0.3s, raised to the 0.4s minimum.
        assert_eq!(track.dialogues.len(), 6);
        assert_eq!(track.dialogues[0].text, "H");
        assert_eq!(track.dialogues[0].start_cs, 0);
        assert_eq!(track.dialogues[0].end_cs, 8);
        assert_eq!(track.dialogues[4].text, "Hello");
        assert_eq!(track.dialogues[4].end_cs, 40);
        let hold = &track.dialogues[5];
        assert_eq!((hold.start_cs, hold.end_cs), (40, 300));
        assert_eq!(hold.text, "Hello");
    }

    #[test]
    fn test_typewriter_reveal_capped_for_short_clip() {
        let layout = Layout::for_format(VideoFormat::Landscape);
        let text = "A long callout label";
        let track = CalloutTrack::build(
            &callout(text, CalloutMode::Typewriter),
            Language::English,
            &layout,
            "Reggae One",
            1.0,
        )
        .unwrap();
        // Reveal capped at 0.9s of a 1.0s clip, then a 0.1s hold.
        let last = track.dialogues.last().unwrap();
        assert_eq!((last.start_cs, last.end_cs), (90, 100));
        assert!(track.dialogues.iter().all(|d| d.end_cs <= 100));
    }

    #[test]
    fn test_empty_callout_has_no_track() {
        let layout = Layout::for_format(VideoFormat::Short);
        assert!(CalloutTrack::build(
            &callout("  \n ", CalloutMode::Static),
            Language::Japanese,
            &layout,
            "Reggae One",
            2.0
        )
        .is_none());
    }

    #[test]
    fn test_japanese_margin_includes_padding() {
        let layout = Layout::for_format(VideoFormat::Landscape);
        let track = CalloutTrack::build(
            &callout("見出し", CalloutMode::Static),
            Language::Japanese,
            &layout,
            "Reggae One",
            2.0,
        )
        .unwrap();
        assert_eq!(track.style.margin_x, 65);
        assert!(track.to_ass().contains(",8,65,65,70,1"));
    }
}
