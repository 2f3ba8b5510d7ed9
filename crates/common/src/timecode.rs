//! Timecode parsing and formatting.
//!
//! Script files carry times either as raw seconds (`"12.5"`, `12.5`) or as
//! colon-separated clock values (`"01:02:03"`, `"02:03.250"`). Every field is
//! read right-to-left in base 60, so `"90"` and `"00:01:30"` are equal.

/// Parse a timecode string into seconds.
///
/// Returns `None` for empty or unparseable input, and for negative values.
pub fn parse_timecode(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let mut seconds = 0.0;
    let mut multiplier = 1.0;
    for part in value.rsplit(':') {
        let part: f64 = part.trim().parse().ok()?;
        if !part.is_finite() || part < 0.0 {
            return None;
        }
        seconds += part * multiplier;
        multiplier *= 60.0;
    }

    seconds.is_finite().then_some(seconds)
}

/// Format whole seconds as `HH:MM:SS` (fraction truncated).
pub fn format_timecode(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).floor() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Format seconds as `HH:MM:SS` or `HH:MM:SS.mmm` when a fraction remains.
pub fn format_timecode_millis(seconds: f64) -> String {
    let seconds = if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    };
    let total_ms = (seconds * 1000.0).round() as u64;
    let base = format_timecode((total_ms / 1000) as f64);
    match total_ms % 1000 {
        0 => base,
        ms => format!("{base}.{ms:03}"),
    }
}

/// Force a trim range to be non-empty: `end <= start` becomes `start + 1`.
pub fn normalize_trim_range(start: f64, end: f64) -> (f64, f64) {
    let start = start.max(0.0);
    if end <= start {
        (start, start + 1.0)
    } else {
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock_and_raw_forms() {
        assert_eq!(parse_timecode("00:01:30"), Some(90.0));
        assert_eq!(parse_timecode("90"), Some(90.0));
        assert_eq!(parse_timecode("1:00:00"), Some(3600.0));
        assert_eq!(parse_timecode(" 12.5 "), Some(12.5));
        assert_eq!(parse_timecode("02:03.250"), Some(123.25));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timecode(""), None);
        assert_eq!(parse_timecode("abc"), None);
        assert_eq!(parse_timecode("00:-1"), None);
        assert_eq!(parse_timecode("1::2"), None);
    }

    #[test]
    fn test_format_whole_seconds() {
        assert_eq!(format_timecode(0.0), "00:00:00");
        assert_eq!(format_timecode(3725.9), "01:02:05");
        assert_eq!(format_timecode(-4.0), "00:00:00");
    }

    #[test]
    fn test_format_with_millis() {
        assert_eq!(format_timecode_millis(12.0), "00:00:12");
        assert_eq!(format_timecode_millis(12.5), "00:00:12.500");
        assert_eq!(format_timecode_millis(59.9996), "00:01:00");
    }

    #[test]
    fn test_normalize_trim_range() {
        assert_eq!(normalize_trim_range(10.0, 12.5), (10.0, 12.5));
        assert_eq!(normalize_trim_range(10.0, 10.0), (10.0, 11.0));
        assert_eq!(normalize_trim_range(10.0, 4.0), (10.0, 11.0));
    }

    mod prop {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn formatted_millis_parse_back(secs in 0.0f64..360_000.0) {
                let text = format_timecode_millis(secs);
                let parsed = parse_timecode(&text).unwrap();
                prop_assert!((parsed - secs).abs() <= 0.0005 + 1e-9);
            }
        }
    }
}
