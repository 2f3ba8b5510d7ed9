//! Subtitle and callout text reflow.
//!
//! Line length is estimated from the font size: one character is roughly one
//! em wide for Japanese text, while Latin text fits about 1.7 times as many
//! characters in the same width. English wraps on word boundaries; every
//! other language wraps on character count.

use podreel_project_model::layout::Layout;
use podreel_project_model::segment::Language;

pub const SUBTITLE_MIN_CHARS_PER_LINE: usize = 10;
pub const SUBTITLE_MAX_CHARS_PER_LINE: usize = 160;
pub const CALLOUT_MIN_CHARS_PER_LINE: usize = 7;

/// Characters-per-em correction for a language.
pub fn chars_multiplier(language: Language) -> f64 {
    match language {
        Language::Japanese => 1.0,
        Language::English => 1.7,
    }
}

/// Extra horizontal callout margin for a language, in pixels.
pub fn callout_extra_margin_x(language: Language) -> u32 {
    match language {
        Language::Japanese => 5,
        Language::English => 0,
    }
}

/// Line length for burned-in subtitles.
pub fn subtitle_chars_per_line(layout: &Layout, language: Language) -> usize {
    let boxes = &layout.subtitles;
    let width = (layout.width as f64 * boxes.max_width_ratio).floor();
    let base = (width / boxes.font_size.max(1) as f64).floor();
    let estimated = (base * chars_multiplier(language)).floor() as usize;
    estimated.clamp(SUBTITLE_MIN_CHARS_PER_LINE, SUBTITLE_MAX_CHARS_PER_LINE)
}

/// Horizontal callout margin including the language correction.
pub fn callout_margin_x(layout: &Layout, language: Language) -> u32 {
    layout.callout.margin_x + callout_extra_margin_x(language)
}

/// Line length for the callout, after subtracting both side margins.
pub fn callout_chars_per_line(layout: &Layout, language: Language) -> usize {
    let callout = &layout.callout;
    let margin = callout_margin_x(layout, language) as f64;
    let target = ((layout.width as f64 * callout.max_width_ratio).floor() - margin * 2.0).max(1.0);
    let base = (target / callout.font_size.max(1) as f64).floor();
    let estimated = (base * chars_multiplier(language)).floor() as usize;
    estimated.clamp(CALLOUT_MIN_CHARS_PER_LINE, SUBTITLE_MAX_CHARS_PER_LINE)
}

/// Remove single line breaks that split a word (`tha\nt` -> `that`).
fn rejoin_broken_words(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let break_len = match (c, chars.get(i + 1)) {
            ('\r', Some('\n')) => 2,
            ('\n', _) => 1,
            _ => 0,
        };
        if break_len > 0 {
            let next = chars.get(i + break_len);
            let joins = prev.is_some_and(char::is_alphanumeric)
                && next.is_some_and(|n| n.is_alphanumeric());
            if joins {
                i += break_len;
                continue;
            }
        }
        out.push(c);
        prev = Some(c);
        i += 1;
    }
    out
}

/// Flatten subtitle text to a single normalized line.
pub fn normalize_subtitle_text(text: &str) -> String {
    rejoin_broken_words(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize callout text, keeping intentional line breaks.
pub fn normalize_callout_text(text: &str) -> String {
    rejoin_broken_words(text)
        .replace('\r', "")
        .split('\n')
        .map(|line| {
            line.split([' ', '\t'])
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap `text` to at most `max_chars` characters per line.
///
/// Existing line breaks are kept; empty lines survive as empty lines.
pub fn wrap_text(text: &str, max_chars: usize, language: Language) -> String {
    let max_chars = max_chars.max(1);
    let normalized = text.replace("\r\n", "\n");
    let mut wrapped: Vec<String> = Vec::new();

    for line in normalized.split('\n') {
        match language {
            Language::English => wrap_words(line, max_chars, &mut wrapped),
            Language::Japanese => wrap_chars(line, max_chars, &mut wrapped),
        }
    }

    wrapped.join("\n")
}

fn wrap_words(line: &str, max_chars: usize, out: &mut Vec<String>) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        out.push(String::new());
        return;
    }

    let mut current = String::new();
    let mut current_len = 0usize;

    for word in trimmed.split(' ').filter(|w| !w.is_empty()) {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
            continue;
        }

        if current_len > 0 {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if word_len <= max_chars {
            current.push_str(word);
            current_len = word_len;
        } else {
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(max_chars) {
                out.push(chunk.iter().collect());
            }
        }
    }

    if current_len > 0 {
        out.push(current);
    }
}

fn wrap_chars(line: &str, max_chars: usize, out: &mut Vec<String>) {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        out.push(String::new());
        return;
    }
    for chunk in chars.chunks(max_chars) {
        out.push(chunk.iter().collect());
    }
}
