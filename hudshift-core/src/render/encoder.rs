// ============================================================================
// hudshift-core/src/render/encoder.rs
// ============================================================================
//
// ENCODER PLANNING: Bitrate Budget and Per-Codec Flag Sets
//
// The video bitrate is derived from a byte budget: either a fixed size per
// quality level or, at the highest level, the size of the source file. The
// audio share is taken off the top and the remainder is spread over the
// effective duration. Each encoder in the fallback chain gets its canonical
// flag set for that bitrate.
//
// KEY COMPONENTS:
// - EncoderPlanner: computes the budget for a job
// - EncoderPlan: the budget plus flag generation per encoder

use crate::config::CoreConfig;
use crate::edit::{EditSpec, HardwareEncoder, MATCH_SOURCE_QUALITY};
use crate::error::{CoreError, CoreResult};
use crate::external::ProbedMedia;
use crate::utils::format_bytes;
use serde::Serialize;

/// GOP length shared by every encoder so intro and core concat cleanly.
pub const GOP_FRAMES: u32 = 60;

/// CRF used by libx264 at the highest quality level.
pub const CPU_HIGHEST_QUALITY_CRF: u32 = 18;

/// Bitrate budget and encoder chain of one render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncoderPlan {
    /// Preferred encoder first, CPU last.
    pub chain: Vec<HardwareEncoder>,
    pub video_kbps: u32,
    pub audio_kbps: u32,
    /// Size the bitrates were derived from.
    pub target_bytes: u64,
    /// Whether the budget fell below the floor and was raised to it.
    pub clamped: bool,
    pub effective_duration: f64,
    pub highest_quality: bool,
    pub label: String,
    cbr_max_seconds: f64,
}

impl EncoderPlan {
    #[must_use]
    pub fn primary(&self) -> HardwareEncoder {
        self.chain.first().copied().unwrap_or(HardwareEncoder::Cpu)
    }

    /// Encoder a failing stage downshifts to.
    #[must_use]
    pub fn fallback(&self) -> Option<HardwareEncoder> {
        self.chain.get(1).copied()
    }

    /// Video flags of the core stage.
    #[must_use]
    pub fn core_flags(&self, encoder: HardwareEncoder, clip_seconds: f64) -> Vec<String> {
        self.flags(encoder, clip_seconds)
    }

    /// Video flags of the intro stage.
    ///
    /// Same codec and GOP as the core so the two can be stream-copied
    /// together; rate control follows the intro's own length.
    #[must_use]
    pub fn intro_flags(&self, encoder: HardwareEncoder, intro_seconds: f64) -> Vec<String> {
        self.flags(encoder, intro_seconds)
    }

    /// Audio encoding flags shared by core and intro.
    #[must_use]
    pub fn audio_flags(&self) -> Vec<String> {
        args(&[
            "-c:a",
            "aac",
            "-b:a",
            &format!("{}k", self.audio_kbps),
            "-ar",
            "48000",
            "-ac",
            "2",
        ])
    }

    fn flags(&self, encoder: HardwareEncoder, seconds: f64) -> Vec<String> {
        let kbps = self.video_kbps;
        let cbr = seconds <= self.cbr_max_seconds;
        let gop = GOP_FRAMES.to_string();
        match encoder {
            HardwareEncoder::Nvenc => {
                let mut flags = args(&["-c:v", "h264_nvenc", "-preset", "p5"]);
                if cbr {
                    flags.extend(args(&["-rc", "cbr"]));
                    flags.extend(rate(kbps, kbps, kbps));
                } else {
                    flags.extend(args(&["-rc", "vbr", "-multipass", "fullres"]));
                    flags.extend(rate(kbps, kbps * 3 / 2, kbps * 2));
                }
                flags.extend(args(&[
                    "-g",
                    &gop,
                    "-keyint_min",
                    &gop,
                    "-forced-idr",
                    "1",
                    "-b_ref_mode",
                    "disabled",
                ]));
                flags
            }
            HardwareEncoder::Amf => {
                let mut flags = args(&["-c:v", "h264_amf", "-quality", "quality"]);
                if cbr {
                    flags.extend(args(&["-rc", "cbr"]));
                    flags.extend(rate(kbps, kbps, kbps));
                } else {
                    flags.extend(args(&["-rc", "vbr_peak"]));
                    flags.extend(rate(kbps, kbps * 3 / 2, kbps * 2));
                }
                flags.extend(args(&["-g", &gop, "-bf", "0"]));
                flags
            }
            HardwareEncoder::Qsv => {
                let mut flags = args(&["-c:v", "h264_qsv", "-preset", "medium"]);
                if cbr {
                    flags.extend(rate(kbps, kbps, kbps));
                } else {
                    flags.extend(rate(kbps, kbps * 3 / 2, kbps * 2));
                }
                flags.extend(args(&["-g", &gop, "-idr_interval", "0", "-bf", "0"]));
                flags
            }
            HardwareEncoder::Cpu => {
                let mut flags = args(&["-c:v", "libx264"]);
                if self.highest_quality {
                    flags.extend(args(&[
                        "-preset",
                        "veryfast",
                        "-crf",
                        &CPU_HIGHEST_QUALITY_CRF.to_string(),
                    ]));
                } else {
                    flags.extend(args(&["-b:v", &format!("{kbps}k"), "-preset", "veryfast"]));
                }
                flags.extend(args(&["-g", &gop, "-keyint_min", &gop, "-sc_threshold", "0"]));
                flags
            }
        }
    }
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn rate(bitrate: u32, maxrate: u32, bufsize: u32) -> Vec<String> {
    vec![
        "-b:v".to_string(),
        format!("{bitrate}k"),
        "-maxrate".to_string(),
        format!("{maxrate}k"),
        "-bufsize".to_string(),
        format!("{bufsize}k"),
    ]
}

/// Computes encoder plans from the configured byte budgets.
pub struct EncoderPlanner<'a> {
    config: &'a CoreConfig,
}

impl<'a> EncoderPlanner<'a> {
    #[must_use]
    pub fn new(config: &'a CoreConfig) -> Self {
        Self { config }
    }

    /// Plans the bitrate for `spec`.
    ///
    /// `source_bytes` is only read at the highest quality level.
    pub fn plan(
        &self,
        spec: &EditSpec,
        probed: &ProbedMedia,
        source_bytes: Option<u64>,
    ) -> CoreResult<EncoderPlan> {
        let effective_duration = spec.effective_duration();
        if !(effective_duration.is_finite() && effective_duration > 0.0) {
            return Err(CoreError::EmptyDuration(effective_duration));
        }

        let audio_kbps = probed.audio_kbps.unwrap_or(self.config.default_audio_kbps);
        let highest_quality = spec.quality_level == MATCH_SOURCE_QUALITY;
        let target_bytes = if highest_quality {
            source_bytes.ok_or_else(|| {
                CoreError::PlanInvariantBroken(
                    "source size is required at the highest quality level".to_string(),
                )
            })?
        } else {
            self.config.target_bytes(spec.quality_level).ok_or_else(|| {
                CoreError::invalid_spec(
                    "quality_level",
                    format!("no size target for level {}", spec.quality_level),
                )
            })?
        };

        let target_bits = 8.0 * target_bytes as f64;
        let audio_bits = f64::from(audio_kbps) * 1024.0 * effective_duration;
        let raw_kbps = (target_bits - audio_bits) / (1024.0 * effective_duration);
        let floor = self.config.min_video_kbps;

        if raw_kbps < 0.0 && !highest_quality {
            return Err(CoreError::DurationTooShortForBudget {
                duration_secs: effective_duration,
                target_mb: target_bytes / (1024 * 1024),
                audio_kbps,
            });
        }
        let clamped = raw_kbps < f64::from(floor);
        let video_kbps = if clamped { floor } else { raw_kbps.floor() as u32 };
        if clamped {
            log::warn!(
                "Video budget of {raw_kbps:.0} kbps is below the {floor} kbps floor; output will exceed the size target"
            );
        }

        let chain = spec.encoder_chain();
        let label = format!(
            "{} @ {video_kbps} kbps video / {audio_kbps} kbps audio",
            chain.first().copied().unwrap_or(HardwareEncoder::Cpu)
        );
        log::info!(
            "Encoder plan: {label} over {effective_duration:.2}s, aiming for {}",
            format_bytes(target_bytes)
        );

        Ok(EncoderPlan {
            chain,
            video_kbps,
            audio_kbps,
            target_bytes,
            clamped,
            effective_duration,
            highest_quality,
            label,
            cbr_max_seconds: self.config.cbr_max_seconds,
        })
    }
}
