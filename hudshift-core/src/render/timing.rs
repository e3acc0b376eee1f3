//! Trim window, fade padding and intro time resolution.

use crate::config::CoreConfig;
use crate::edit::{EditSpec, IntroTime};
use crate::external::ProbedMedia;
use serde::Serialize;

/// Latest intro still position relative to the end of the source.
pub const INTRO_END_GUARD_SECONDS: f64 = 0.05;

/// Source window read by the core stage, with the fades it carries.
///
/// Fade padding extends the window by the fade duration on each side that
/// has enough source material, so fades are added content rather than a
/// cut into the selection. All values are source seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrimWindow {
    /// Seek position (`-ss`).
    pub in_ss: f64,
    /// Length read from the source (`-t`).
    pub in_t: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    pub speed: f64,
}

impl TrimWindow {
    /// Computes the padded window for `spec` over a source of `probed.duration_seconds`.
    #[must_use]
    pub fn compute(spec: &EditSpec, probed: &ProbedMedia, config: &CoreConfig) -> Self {
        let start = spec.trim_start_seconds();
        let end = spec.trim_end_seconds().min(probed.duration_seconds);
        let clip = (end - start).max(0.0);

        let fade = if spec.disable_fades {
            0.0
        } else {
            config.fade_seconds.min(clip / 3.0)
        };
        let head_room = start >= config.fade_seconds;
        let tail_room = probed.duration_seconds - end >= config.fade_seconds;
        let fade_in = if fade > 0.0 && head_room { fade } else { 0.0 };
        let fade_out = if fade > 0.0 && tail_room { fade } else { 0.0 };

        Self {
            in_ss: start - fade_in,
            in_t: clip + fade_in + fade_out,
            fade_in,
            fade_out,
            speed: spec.speed_factor,
        }
    }

    /// Duration of the encoded core clip.
    #[must_use]
    pub fn output_duration(&self) -> f64 {
        self.in_t / self.speed
    }

    /// Fade-out start measured from the seek position, in source seconds.
    #[must_use]
    pub fn fade_out_start(&self) -> f64 {
        (self.in_t - self.fade_out).max(0.0)
    }

    #[must_use]
    pub fn has_fades(&self) -> bool {
        self.fade_in > 0.0 || self.fade_out > 0.0
    }
}

/// Absolute source time of the intro still, clamped into the source.
#[must_use]
pub fn resolve_intro_time(spec: &EditSpec, at: IntroTime, source_duration: f64) -> f64 {
    let wanted = match at {
        IntroTime::Absolute(seconds) => seconds,
        IntroTime::FromMidpoint => (spec.trim_start_seconds() + spec.trim_end_seconds()) / 2.0,
    };
    let latest = (source_duration - INTRO_END_GUARD_SECONDS).max(0.0);
    wanted.clamp(0.0, latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{HardwareEncoder, OutputFormat};
    use std::path::PathBuf;

    fn spec(start_ms: u64, end_ms: u64) -> EditSpec {
        EditSpec {
            input_path: PathBuf::from("in.mp4"),
            trim_start_ms: start_ms,
            trim_end_ms: end_ms,
            speed_factor: 1.0,
            format: OutputFormat::Landscape {
                keep_source_res: true,
            },
            quality_level: 2,
            background_music: None,
            intro_still: None,
            disable_fades: false,
            hardware_strategy: vec![HardwareEncoder::Cpu],
            output_path: PathBuf::from("out.mp4"),
        }
    }

    fn media(duration: f64) -> ProbedMedia {
        ProbedMedia {
            width: 1920,
            height: 1080,
            duration_seconds: duration,
            audio_kbps: Some(160),
            has_audio: true,
            frame_rate: Some(60.0),
        }
    }

    #[test]
    fn pads_both_sides_when_source_has_room() {
        let window =
            TrimWindow::compute(&spec(10_000, 40_000), &media(120.0), &CoreConfig::default());
        assert_eq!(window.fade_in, 1.5);
        assert_eq!(window.fade_out, 1.5);
        assert!((window.in_ss - 8.5).abs() < 1e-9);
        assert!((window.in_t - 33.0).abs() < 1e-9);
        assert!((window.fade_out_start() - 31.5).abs() < 1e-9);
    }

    #[test]
    fn trim_at_source_start_suppresses_fade_in() {
        let window = TrimWindow::compute(&spec(0, 20_000), &media(120.0), &CoreConfig::default());
        assert_eq!(window.fade_in, 0.0);
        assert_eq!(window.in_ss, 0.0);
        assert_eq!(window.fade_out, 1.5);
    }

    #[test]
    fn trim_at_source_end_suppresses_fade_out() {
        let window =
            TrimWindow::compute(&spec(100_000, 120_000), &media(120.0), &CoreConfig::default());
        assert_eq!(window.fade_out, 0.0);
        assert!((window.in_t - 21.5).abs() < 1e-9);
    }

    #[test]
    fn tiny_clip_gets_a_third_of_its_length() {
        let window =
            TrimWindow::compute(&spec(50_000, 50_100), &media(120.0), &CoreConfig::default());
        assert!((window.fade_in - 0.1 / 3.0).abs() < 1e-9);
        assert!(window.fade_out_start() >= 0.0);
        assert!(window.output_duration() > 0.0);
    }

    #[test]
    fn disabled_fades_leave_the_window_alone() {
        let mut spec = spec(10_000, 40_000);
        spec.disable_fades = true;
        let window = TrimWindow::compute(&spec, &media(120.0), &CoreConfig::default());
        assert!(!window.has_fades());
        assert_eq!(window.in_ss, 10.0);
        assert_eq!(window.in_t, 30.0);
    }

    #[test]
    fn speed_shortens_output() {
        let mut spec = spec(60_000, 75_000);
        spec.speed_factor = 2.0;
        spec.disable_fades = true;
        let window = TrimWindow::compute(&spec, &media(300.0), &CoreConfig::default());
        assert!((window.output_duration() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn intro_time_is_clamped() {
        let spec = spec(10_000, 40_000);
        assert_eq!(resolve_intro_time(&spec, IntroTime::FromMidpoint, 120.0), 25.0);
        assert_eq!(resolve_intro_time(&spec, IntroTime::Absolute(500.0), 120.0), 119.95);
        assert_eq!(resolve_intro_time(&spec, IntroTime::FromMidpoint, 20.0), 19.95);
    }
}
