//! ffprobe integration for source analysis.
//!
//! The prober issues two requests: one for the first video stream plus the
//! container (size and duration), one for the first audio stream (bit rate).
//! Both ask for JSON output which is parsed with serde. A missing audio bit
//! rate falls back to the container rate; when that is unusable too the
//! bitrate is reported as unknown and the planner assumes a default.

use crate::error::{CoreError, CoreResult, command_start_error};
use crate::layout::SourceResolution;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Audio bit rates below this are treated as unknown.
pub const MIN_AUDIO_KBPS: u32 = 8;

/// What the planner needs to know about a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbedMedia {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
    /// `None` when the probe could not determine it.
    pub audio_kbps: Option<u32>,
    pub has_audio: bool,
    /// Average frame rate of the video stream, when reported.
    pub frame_rate: Option<f64>,
}

impl ProbedMedia {
    #[must_use]
    pub fn resolution(&self) -> SourceResolution {
        SourceResolution::new(self.width, self.height)
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        (self.duration_seconds * 1000.0).round() as u64
    }
}

/// Source analysis seam; the real implementation shells out to ffprobe.
pub trait MediaProber {
    fn probe(&self, input_path: &Path) -> CoreResult<ProbedMedia>;
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// `MediaProber` backed by the ffprobe binary.
#[derive(Debug, Clone)]
pub struct FfprobeCli {
    ffprobe_path: PathBuf,
}

impl FfprobeCli {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn run(&self, input_path: &Path, selector: &str, entries: &str) -> CoreResult<ProbeOutput> {
        let mut cmd = Command::new(&self.ffprobe_path);
        cmd.args(["-v", "error", "-select_streams", selector, "-show_entries", entries])
            .args(["-print_format", "json"])
            .arg(input_path);
        log::debug!("Running probe command: {cmd:?}");

        let output = cmd
            .output()
            .map_err(|e| command_start_error(self.ffprobe_path.display().to_string(), e))?;
        if !output.status.success() {
            return Err(CoreError::ProbeFailed {
                path: input_path.to_path_buf(),
                reason: format!(
                    "ffprobe exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        serde_json::from_slice(&output.stdout).map_err(|e| CoreError::ProbeFailed {
            path: input_path.to_path_buf(),
            reason: format!("unparseable ffprobe output: {e}"),
        })
    }
}

impl MediaProber for FfprobeCli {
    fn probe(&self, input_path: &Path) -> CoreResult<ProbedMedia> {
        if !input_path.is_file() {
            return Err(CoreError::ProbeFailed {
                path: input_path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        log::debug!("Probing {}", input_path.display());

        let video = self.run(
            input_path,
            "v:0",
            "stream=width,height,r_frame_rate,avg_frame_rate,duration,bit_rate:format=duration,bit_rate",
        )?;
        // A failing audio request is not fatal; the container rate stands in.
        let audio = self.run(input_path, "a:0", "stream=bit_rate");
        if let Err(e) = &audio {
            log::warn!("Audio probe failed for {}: {e}", input_path.display());
        }
        let answer = match &audio {
            Ok(output) => AudioAnswer::Streams(output),
            Err(_) => AudioAnswer::Failed,
        };
        let media = interpret_probe(input_path, &video, answer)?;
        log::info!(
            "Probed {}: {}x{}, {:.2}s, audio {}",
            input_path.display(),
            media.width,
            media.height,
            media.duration_seconds,
            media
                .audio_kbps
                .map_or_else(|| "unknown".to_string(), |kbps| format!("{kbps} kbps"))
        );
        Ok(media)
    }
}

/// What the `a:0` request returned.
#[derive(Debug, Clone, Copy)]
enum AudioAnswer<'a> {
    Streams(&'a ProbeOutput),
    /// The request itself failed, so the stream is assumed present.
    Failed,
}

fn interpret_probe(
    input_path: &Path,
    video: &ProbeOutput,
    audio: AudioAnswer<'_>,
) -> CoreResult<ProbedMedia> {
    let fail = |reason: &str| CoreError::ProbeFailed {
        path: input_path.to_path_buf(),
        reason: reason.to_string(),
    };

    let stream = video.streams.first().ok_or_else(|| fail("no video stream"))?;
    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(fail("video stream has no width/height")),
    };

    let format = video.format.as_ref();
    let duration_seconds = format
        .and_then(|f| parse_number(f.duration.as_deref()))
        .or_else(|| parse_number(stream.duration.as_deref()))
        .filter(|d| *d > 0.0)
        .ok_or_else(|| fail("duration is unreadable"))?;

    let audio_stream = match audio {
        AudioAnswer::Streams(output) => output.streams.first(),
        AudioAnswer::Failed => None,
    };
    let has_audio = matches!(audio, AudioAnswer::Failed) || audio_stream.is_some();
    let stream_kbps = audio_stream
        .and_then(|s| parse_number(s.bit_rate.as_deref()))
        .map(|bps| bps / 1000.0);
    let container_kbps = || {
        let container = parse_number(format.and_then(|f| f.bit_rate.as_deref()))?;
        let video_rate = parse_number(stream.bit_rate.as_deref()).unwrap_or(0.0);
        let remainder = container - video_rate;
        let bps = if remainder > 0.0 { remainder } else { container };
        Some(bps / 1000.0)
    };
    let audio_kbps = stream_kbps
        .or_else(|| if has_audio { container_kbps() } else { None })
        .map(|kbps| kbps.round() as u32)
        .filter(|kbps| *kbps >= MIN_AUDIO_KBPS);

    let frame_rate = parse_rate(stream.avg_frame_rate.as_deref())
        .or_else(|| parse_rate(stream.r_frame_rate.as_deref()));

    Ok(ProbedMedia {
        width,
        height,
        duration_seconds,
        audio_kbps,
        has_audio,
        frame_rate,
    })
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "N/A")
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parses `60000/1001` style rates; `0/0` yields `None`.
fn parse_rate(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().ok()?;
            let den = den.parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ProbeOutput {
        serde_json::from_str(json).expect("probe json")
    }

    #[test]
    fn reads_video_and_audio_requests() {
        let video = parse(
            r#"{"programs": [], "streams": [{"width": 1920, "height": 1080, "r_frame_rate": "60/1", "avg_frame_rate": "60000/1001", "bit_rate": "12000000"}],
               "format": {"duration": "312.480000", "bit_rate": "12192000"}}"#,
        );
        let audio = parse(r#"{"streams": [{"bit_rate": "192000"}]}"#);
        let media = interpret_probe(Path::new("in.mp4"), &video, AudioAnswer::Streams(&audio))
            .expect("media");
        assert_eq!(media.resolution(), SourceResolution::new(1920, 1080));
        assert!((media.duration_seconds - 312.48).abs() < 1e-9);
        assert_eq!(media.audio_kbps, Some(192));
        assert!(media.has_audio);
        assert!((media.frame_rate.expect("rate") - 59.94).abs() < 0.01);
    }

    #[test]
    fn falls_back_to_container_rate() {
        let video = parse(
            r#"{"streams": [{"width": 2560, "height": 1440, "bit_rate": "8000000"}],
               "format": {"duration": "60.0", "bit_rate": "8160000"}}"#,
        );
        let audio = parse(r#"{"streams": [{"bit_rate": "N/A"}]}"#);
        let media = interpret_probe(Path::new("in.mkv"), &video, AudioAnswer::Streams(&audio))
            .expect("media");
        assert_eq!(media.audio_kbps, Some(160));
    }

    #[test]
    fn missing_audio_is_unknown() {
        let video = parse(
            r#"{"streams": [{"width": 1920, "height": 1080}], "format": {"duration": "10"}}"#,
        );
        let audio = parse(r#"{"streams": []}"#);
        let media = interpret_probe(Path::new("in.mp4"), &video, AudioAnswer::Streams(&audio))
            .expect("media");
        assert_eq!(media.audio_kbps, None);
        assert!(!media.has_audio);
        assert_eq!(media.frame_rate, None);
    }

    #[test]
    fn failed_audio_request_keeps_source_audio() {
        let video = parse(
            r#"{"streams": [{"width": 1920, "height": 1080, "bit_rate": "8000000"}],
               "format": {"duration": "90.0", "bit_rate": "8192000"}}"#,
        );
        let media =
            interpret_probe(Path::new("in.mp4"), &video, AudioAnswer::Failed).expect("media");
        assert!(media.has_audio);
        assert_eq!(media.audio_kbps, Some(192));
    }

    #[test]
    fn unreadable_duration_fails() {
        let video = parse(
            r#"{"streams": [{"width": 1920, "height": 1080}], "format": {"duration": "N/A"}}"#,
        );
        let err = interpret_probe(Path::new("in.mp4"), &video, AudioAnswer::Failed)
            .expect_err("must fail");
        assert_eq!(err.kind(), crate::error::ErrorKind::ProbeFailed);
    }

    #[test]
    fn missing_dimensions_fail() {
        let video = parse(r#"{"streams": [{"width": 1920}], "format": {"duration": "10"}}"#);
        assert!(interpret_probe(Path::new("in.mp4"), &video, AudioAnswer::Failed).is_err());
    }

    #[test]
    fn missing_file_fails_before_spawning() {
        let prober = FfprobeCli::new("/definitely/not/ffprobe");
        let err = prober
            .probe(Path::new("/definitely/not/here.mp4"))
            .expect_err("must fail");
        assert_eq!(err.kind(), crate::error::ErrorKind::ProbeFailed);
    }
}
