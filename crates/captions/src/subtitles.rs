//! Subtitle export in SRT and VTT formats.
//!
//! Cues come from the speech entries of a resolved timeline, shifted by the
//! intro length. When cues overlap, each one is cut at the next cue's start
//! but never shorter than [`MIN_CUE_SECS`].

use std::path::Path;

use podreel_common::error::PodreelResult;
use podreel_project_model::segment::Segment;
use podreel_project_model::timeline::Timeline;

/// Shortest cue ever written.
pub const MIN_CUE_SECS: f64 = 0.05;

/// One subtitle cue in output-file seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// Build cues from the speech entries of a timeline.
///
/// `intro_secs` is added to every start; `time_scale` maps timeline seconds
/// to output seconds (below 1 when the final encode speeds everything up).
pub fn cues_from_timeline(timeline: &Timeline, intro_secs: f64, time_scale: f64) -> Vec<SubtitleCue> {
    let scale = if time_scale.is_finite() && time_scale > 0.0 {
        time_scale
    } else {
        1.0
    };

    let mut cues: Vec<SubtitleCue> = timeline
        .iter()
        .filter_map(|entry| {
            let Segment::Speech(speech) = &entry.segment else {
                return None;
            };
            let text = speech.text.trim();
            if text.is_empty() || entry.duration_secs <= 0.0 {
                return None;
            }
            let start = (intro_secs + entry.start_secs) * scale;
            let end = start + (entry.duration_secs * scale).max(MIN_CUE_SECS);
            Some(SubtitleCue {
                start_secs: start,
                end_secs: end,
                text: text.to_string(),
            })
        })
        .collect();

    cues.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));
    clip_overlaps(&mut cues);
    cues
}

/// Cut each cue at the next cue's start when they overlap.
pub fn clip_overlaps(cues: &mut [SubtitleCue]) {
    for i in 0..cues.len().saturating_sub(1) {
        let next_start = cues[i + 1].start_secs;
        let cue = &mut cues[i];
        if next_start > cue.start_secs && next_start < cue.end_secs {
            cue.end_secs = (cue.start_secs + MIN_CUE_SECS).max(next_start);
        }
    }
}

fn cue_text(cue: &SubtitleCue) -> Option<String> {
    let text = cue.text.replace("\r\n", "\n").replace('\r', "\n");
    let text = text.trim();
    let valid = cue.start_secs.is_finite() && cue.end_secs.is_finite() && cue.end_secs > cue.start_secs;
    (valid && !text.is_empty()).then(|| text.to_string())
}

/// Generate SRT subtitle content. Empty or zero-length cues are skipped.
pub fn generate_srt(cues: &[SubtitleCue]) -> String {
    let mut output = String::new();
    let mut index = 1;

    for cue in cues {
        let Some(text) = cue_text(cue) else {
            continue;
        };
        output.push_str(&format!("{index}\n"));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(cue.start_secs),
            format_srt_time(cue.end_secs),
        ));
        output.push_str(&text);
        output.push_str("\n\n");
        index += 1;
    }

    output
}

/// Generate WebVTT subtitle content.
pub fn generate_vtt(cues: &[SubtitleCue]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for cue in cues {
        let Some(text) = cue_text(cue) else {
            continue;
        };
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(cue.start_secs),
            format_vtt_time(cue.end_secs),
        ));
        output.push_str(&text);
        output.push_str("\n\n");
    }

    output
}

fn split_millis(secs: f64) -> (u64, u64, u64, u64) {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let total_ms = (secs * 1000.0).round() as u64;
    (
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000,
    )
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
pub fn format_srt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_millis(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
pub fn format_vtt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_millis(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Save subtitles to a file; `.vtt` selects WebVTT, anything else SRT.
pub fn save_subtitles(cues: &[SubtitleCue], path: &Path) -> PodreelResult<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("vtt") => generate_vtt(cues),
        _ => generate_srt(cues),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), cues = cues.len(), "Subtitles written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use podreel_project_model::segment::{SectionCard, SpeechSegment};
    use podreel_project_model::timeline::TimedSegment;
    use std::path::PathBuf;

    fn speech_entry(index: usize, text: &str, start: f64, duration: f64) -> TimedSegment {
        TimedSegment {
            index,
            segment: Segment::Speech(SpeechSegment {
                audio: PathBuf::from("a.wav"),
                text: text.to_string(),
                speaker: "host".into(),
                mood: None,
                background: None,
                sound_effect: None,
                echo: false,
                zoom: false,
                effect: None,
                language: Default::default(),
                callout: None,
                requested_start: None,
                known_duration: None,
            }),
            start_secs: start,
            duration_secs: duration,
            requested: false,
        }
    }

    fn timeline(entries: Vec<TimedSegment>) -> Timeline {
        Timeline {
            entries,
            overlaps: vec![],
        }
    }

    #[test]
    fn test_cues_offset_by_intro_and_skip_empty() {
        let section = TimedSegment {
            index: 1,
            segment: Segment::Section(SectionCard {
                label: "Part".into(),
                duration: 1.0,
                sound_effect: None,
            }),
            start_secs: 2.0,
            duration_secs: 1.0,
            requested: false,
        };
        let cues = cues_from_timeline(
            &timeline(vec![
                speech_entry(0, "Hello", 0.0, 2.0),
                section,
                speech_entry(2, "  ", 3.0, 1.0),
                speech_entry(3, "World", 3.0, 1.5),
            ]),
            2.0,
            1.0,
        );
        assert_eq!(cues.len(), 2);
        assert_eq!((cues[0].start_secs, cues[0].end_secs), (2.0, 4.0));
        assert_eq!((cues[1].start_secs, cues[1].end_secs), (5.0, 6.5));
    }

    #[test]
    fn test_overlapping_cues_are_clipped() {
        let cues = cues_from_timeline(
            &timeline(vec![
                speech_entry(0, "first", 0.0, 3.0),
                speech_entry(1, "second", 2.0, 1.0),
            ]),
            0.0,
            1.0,
        );
        assert_eq!(cues[0].end_secs, 2.0);
        assert_eq!(cues[1].start_secs, 2.0);
    }

    #[test]
    fn test_time_scale_applies_to_whole_cue() {
        let cues = cues_from_timeline(
            &timeline(vec![speech_entry(0, "fast", 4.0, 2.0)]),
            2.0,
            0.5,
        );
        assert_eq!((cues[0].start_secs, cues[0].end_secs), (3.0, 4.0));
    }

    #[test]
    fn test_srt_generation() {
        let cues = vec![
            SubtitleCue {
                start_secs: 0.0,
                end_secs: 2.5,
                text: "Hello world".to_string(),
            },
            SubtitleCue {
                start_secs: 3.0,
                end_secs: 3.0,
                text: "zero length".to_string(),
            },
            SubtitleCue {
                start_secs: 3.0,
                end_secs: 5.0,
                text: "This is a test\r\n".to_string(),
            },
        ];

        let srt = generate_srt(&cues);
        assert!(srt.contains("1\n00:00:00,000 --> 00:00:02,500\nHello world"));
        assert!(srt.contains("2\n00:00:03,000 --> 00:00:05,000\nThis is a test\n\n"));
        assert!(!srt.contains("zero length"));
    }

    #[test]
    fn test_vtt_generation() {
        let cues = vec![SubtitleCue {
            start_secs: 61.5,
            end_secs: 63.0,
            text: "One minute in".to_string(),
        }];

        let vtt = generate_vtt(&cues);
        assert!(vtt.starts_with("WEBVTT\n"));
        assert!(vtt.contains("00:01:01.500 --> 00:01:03.000"));
    }

    #[test]
    fn test_time_formatting_rounds_to_millis() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(3661.5), "01:01:01,500");
        assert_eq!(format_srt_time(1.2346), "00:00:01,235");
        assert_eq!(format_srt_time(-3.0), "00:00:00,000");
        assert_eq!(format_vtt_time(3661.5), "01:01:01.500");
    }

    #[test]
    fn test_save_subtitles_picks_format() {
        let dir = tempfile::tempdir().unwrap();
        let cues = vec![SubtitleCue {
            start_secs: 1.0,
            end_secs: 2.0,
            text: "hi".to_string(),
        }];
        let srt = dir.path().join("out.srt");
        let vtt = dir.path().join("out.vtt");
        save_subtitles(&cues, &srt).unwrap();
        save_subtitles(&cues, &vtt).unwrap();
        assert!(std::fs::read_to_string(srt).unwrap().starts_with("1\n"));
        assert!(std::fs::read_to_string(vtt).unwrap().starts_with("WEBVTT"));
    }
}
