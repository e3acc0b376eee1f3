//! Utility functions for formatting, parsing and pixel arithmetic.
//!
//! These helpers are shared by the planner (number formatting inside filter
//! graphs and argv), the executor (ffmpeg time parsing) and the CLI (human
//! readable durations and sizes).

use std::path::Path;

/// Formats seconds as HH:MM:SS (e.g., 3725.0 -> "01:02:05"). Returns "??:??:??" for invalid inputs.
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return "??:??:??".to_string();
    }

    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Formats bytes with appropriate binary units (B, KiB, MiB, GiB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let bytes_f64 = bytes as f64;
    if bytes_f64 >= GIB {
        format!("{:.2} GiB", bytes_f64 / GIB)
    } else if bytes_f64 >= MIB {
        format!("{:.2} MiB", bytes_f64 / MIB)
    } else if bytes_f64 >= KIB {
        format!("{:.2} KiB", bytes_f64 / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Parses FFmpeg time string (HH:MM:SS.MS) to seconds. Returns None if invalid.
#[must_use]
pub fn parse_ffmpeg_time(time: &str) -> Option<f64> {
    let parts: Vec<&str> = time.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours = parts[0].parse::<f64>().ok()?;
    let minutes = parts[1].parse::<f64>().ok()?;
    let seconds = parts[2].parse::<f64>().ok()?;
    if hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Finds the last `time=HH:MM:SS.ms` token in an encoder output line.
///
/// ffmpeg prints `time=N/A` before the first frame is muxed; such tokens are skipped.
#[must_use]
pub fn extract_time_token(line: &str) -> Option<f64> {
    line.match_indices("time=")
        .filter_map(|(idx, token)| {
            let rest = &line[idx + token.len()..];
            let value = rest.split_whitespace().next()?;
            parse_ffmpeg_time(value)
        })
        .last()
}

/// Rounds to the nearest even integer, never below zero.
#[must_use]
pub fn round_even(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    ((value / 2.0).round() * 2.0) as u32
}

/// Largest even integer not above `value`.
#[must_use]
pub fn floor_even(value: u32) -> u32 {
    value & !1
}

/// Formats a time value in seconds for argv and filter graphs.
///
/// Millisecond precision, trailing zeros trimmed: `8.5`, `10`, `0.033`.
#[must_use]
pub fn fmt_secs(seconds: f64) -> String {
    let text = format!("{seconds:.3}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Formats a multiplier that must always carry a decimal point: `2.0`, `1.25`.
#[must_use]
pub fn fmt_factor(factor: f64) -> String {
    let text = fmt_secs(factor);
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

/// File stem of a path, or "output" when the path has none.
#[must_use]
pub fn file_stem_or_default(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00:00");
        assert_eq!(format_duration(59.9), "00:00:59");
        assert_eq!(format_duration(3661.0), "01:01:01");
        assert_eq!(format_duration(-1.0), "??:??:??");
        assert_eq!(format_duration(f64::NAN), "??:??:??");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(45 * 1024 * 1024), "45.00 MiB");
        assert_eq!(format_bytes(1024 * 1024 * 1024 * 2), "2.00 GiB");
    }

    #[test]
    fn test_parse_ffmpeg_time() {
        assert_eq!(parse_ffmpeg_time("00:00:01.25"), Some(1.25));
        assert_eq!(parse_ffmpeg_time("01:30:45.75"), Some(5445.75));
        assert_eq!(parse_ffmpeg_time("00:00"), None);
        assert_eq!(parse_ffmpeg_time("N/A"), None);
        assert_eq!(parse_ffmpeg_time("-00:00:01.00"), None);
    }

    #[test]
    fn test_extract_time_token() {
        let line = "frame=  240 fps=120 q=23.0 size=    1024kB time=00:00:04.00 bitrate=2097.2kbits/s speed=2.0x";
        assert_eq!(extract_time_token(line), Some(4.0));
        assert_eq!(extract_time_token("size=N/A time=N/A bitrate=N/A"), None);
        assert_eq!(extract_time_token("Stream mapping:"), None);
    }

    #[test]
    fn test_even_rounding() {
        assert_eq!(round_even(0.0), 0);
        assert_eq!(round_even(3.0), 4);
        assert_eq!(round_even(4.9), 4);
        assert_eq!(round_even(5.1), 6);
        assert_eq!(round_even(-7.0), 0);
        assert_eq!(floor_even(7), 6);
        assert_eq!(floor_even(8), 8);
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(fmt_secs(8.5), "8.5");
        assert_eq!(fmt_secs(10.0), "10");
        assert_eq!(fmt_secs(0.0333333), "0.033");
        assert_eq!(fmt_secs(0.0), "0");
        assert_eq!(fmt_factor(2.0), "2.0");
        assert_eq!(fmt_factor(1.25), "1.25");
        assert_eq!(fmt_factor(0.35), "0.35");
    }
}
