// ============================================================================
// hudshift-core/src/edit.rs
// ============================================================================
//
// EDIT DESCRIPTION: The Immutable Input of a Render Job
//
// An EditSpec is built once per job by the caller (CLI, GUI, job file) and
// never mutated. Validation here covers everything that can be checked
// without probing the source; checks that need the source duration run in
// the planner.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::layout::{HudLayout, HudSelection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Highest quality level; matches the source file size.
pub const MATCH_SOURCE_QUALITY: u8 = 4;

/// Output framing of a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputFormat {
    /// 1080x1920 canvas with HUD elements composited over the reframed action.
    Portrait {
        #[serde(default = "HudLayout::reference")]
        layout: HudLayout,
        #[serde(default)]
        teammates_visible: bool,
        #[serde(default)]
        boss_hp: bool,
        #[serde(default)]
        overlay_text: Option<String>,
    },
    /// Keeps the source framing.
    Landscape {
        #[serde(default)]
        keep_source_res: bool,
    },
}

impl OutputFormat {
    #[must_use]
    pub fn is_portrait(&self) -> bool {
        matches!(self, OutputFormat::Portrait { .. })
    }

    /// Caption text, if any non-blank text was given.
    #[must_use]
    pub fn overlay_text(&self) -> Option<&str> {
        match self {
            OutputFormat::Portrait {
                overlay_text: Some(text),
                ..
            } if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        }
    }

    /// Active HUD selection of a portrait render.
    #[must_use]
    pub fn selection(&self) -> Option<HudSelection> {
        match self {
            OutputFormat::Portrait {
                teammates_visible,
                boss_hp,
                ..
            } => Some(HudSelection {
                teammates_visible: *teammates_visible,
                boss_hp: *boss_hp,
            }),
            OutputFormat::Landscape { .. } => None,
        }
    }
}

/// Background music mixed under the game audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicTrack {
    pub path: PathBuf,
    /// Linear gain in [0, 1].
    #[serde(default = "default_music_volume")]
    pub volume: f64,
    /// Seconds skipped at the start of the track.
    #[serde(default)]
    pub offset_seconds: f64,
}

fn default_music_volume() -> f64 {
    0.35
}

/// Where the intro still is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntroTime {
    /// Absolute source time in seconds.
    Absolute(f64),
    /// Middle of the trim window.
    FromMidpoint,
}

/// A frozen frame shown before the clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntroStill {
    pub duration_seconds: f64,
    #[serde(default = "default_intro_time")]
    pub at: IntroTime,
}

fn default_intro_time() -> IntroTime {
    IntroTime::FromMidpoint
}

/// Video encoder backends, in the order they are usually preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareEncoder {
    Nvenc,
    Amf,
    Qsv,
    Cpu,
}

impl HardwareEncoder {
    /// ffmpeg codec name.
    #[must_use]
    pub fn codec(self) -> &'static str {
        match self {
            HardwareEncoder::Nvenc => "h264_nvenc",
            HardwareEncoder::Amf => "h264_amf",
            HardwareEncoder::Qsv => "h264_qsv",
            HardwareEncoder::Cpu => "libx264",
        }
    }

    #[must_use]
    pub fn is_hardware(self) -> bool {
        self != HardwareEncoder::Cpu
    }
}

impl fmt::Display for HardwareEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HardwareEncoder::Nvenc => "NVENC",
            HardwareEncoder::Amf => "AMF",
            HardwareEncoder::Qsv => "QSV",
            HardwareEncoder::Cpu => "CPU",
        };
        write!(f, "{name} ({})", self.codec())
    }
}

fn default_strategy() -> Vec<HardwareEncoder> {
    vec![HardwareEncoder::Cpu]
}

/// Complete description of one render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditSpec {
    pub input_path: PathBuf,
    pub trim_start_ms: u64,
    pub trim_end_ms: u64,
    #[serde(default = "default_speed")]
    pub speed_factor: f64,
    pub format: OutputFormat,
    #[serde(default)]
    pub quality_level: u8,
    #[serde(default)]
    pub background_music: Option<MusicTrack>,
    #[serde(default)]
    pub intro_still: Option<IntroStill>,
    #[serde(default)]
    pub disable_fades: bool,
    #[serde(default = "default_strategy")]
    pub hardware_strategy: Vec<HardwareEncoder>,
    pub output_path: PathBuf,
}

fn default_speed() -> f64 {
    1.0
}

impl EditSpec {
    /// Length of the selection in source seconds.
    #[must_use]
    pub fn trim_seconds(&self) -> f64 {
        self.trim_end_ms.saturating_sub(self.trim_start_ms) as f64 / 1000.0
    }

    #[must_use]
    pub fn trim_start_seconds(&self) -> f64 {
        self.trim_start_ms as f64 / 1000.0
    }

    #[must_use]
    pub fn trim_end_seconds(&self) -> f64 {
        self.trim_end_ms as f64 / 1000.0
    }

    #[must_use]
    pub fn intro_seconds(&self) -> f64 {
        self.intro_still.map_or(0.0, |intro| intro.duration_seconds)
    }

    /// `(trim_end - trim_start) / speed + intro`, the duration bitrates are planned for.
    #[must_use]
    pub fn effective_duration(&self) -> f64 {
        self.trim_seconds() / self.speed_factor + self.intro_seconds()
    }

    #[must_use]
    pub fn is_highest_quality(&self) -> bool {
        self.quality_level == MATCH_SOURCE_QUALITY
    }

    /// The encoder preference list with CPU guaranteed last.
    #[must_use]
    pub fn encoder_chain(&self) -> Vec<HardwareEncoder> {
        let mut chain: Vec<HardwareEncoder> = Vec::with_capacity(self.hardware_strategy.len() + 1);
        for encoder in &self.hardware_strategy {
            if !chain.contains(encoder) {
                chain.push(*encoder);
            }
        }
        if chain.last() != Some(&HardwareEncoder::Cpu) {
            chain.retain(|e| *e != HardwareEncoder::Cpu);
            chain.push(HardwareEncoder::Cpu);
        }
        chain
    }

    /// Checks every field that does not depend on the source media.
    pub fn validate(&self, config: &CoreConfig) -> CoreResult<()> {
        if self.input_path.as_os_str().is_empty() {
            return Err(CoreError::invalid_spec("input_path", "must not be empty"));
        }
        if self.trim_start_ms >= self.trim_end_ms {
            return Err(CoreError::invalid_spec(
                "trim_end_ms",
                format!(
                    "trim end {} must be after trim start {}",
                    self.trim_end_ms, self.trim_start_ms
                ),
            ));
        }
        if !(self.speed_factor.is_finite()
            && self.speed_factor >= config.min_speed
            && self.speed_factor <= config.max_speed)
        {
            return Err(CoreError::invalid_spec(
                "speed_factor",
                format!(
                    "{} is outside {}..={}",
                    self.speed_factor, config.min_speed, config.max_speed
                ),
            ));
        }
        if self.quality_level > MATCH_SOURCE_QUALITY {
            return Err(CoreError::invalid_spec(
                "quality_level",
                format!("{} is not in 0..=4", self.quality_level),
            ));
        }
        if let Some(music) = &self.background_music {
            if music.path.as_os_str().is_empty() {
                return Err(CoreError::invalid_spec("background_music.path", "must not be empty"));
            }
            if !(0.0..=1.0).contains(&music.volume) {
                return Err(CoreError::invalid_spec(
                    "background_music.volume",
                    format!("{} is not in [0, 1]", music.volume),
                ));
            }
            if !(music.offset_seconds.is_finite() && music.offset_seconds >= 0.0) {
                return Err(CoreError::invalid_spec(
                    "background_music.offset_seconds",
                    "must be zero or positive",
                ));
            }
        }
        if let Some(intro) = &self.intro_still {
            if !(intro.duration_seconds.is_finite() && intro.duration_seconds > 0.0) {
                return Err(CoreError::invalid_spec(
                    "intro_still.duration_seconds",
                    "must be positive",
                ));
            }
            if let IntroTime::Absolute(at) = intro.at {
                if !(at.is_finite() && at >= 0.0) {
                    return Err(CoreError::invalid_spec(
                        "intro_still.absolute_time_seconds",
                        "must be zero or positive",
                    ));
                }
            }
        }
        if let Some(position) = self
            .hardware_strategy
            .iter()
            .position(|e| *e == HardwareEncoder::Cpu)
        {
            if position + 1 != self.hardware_strategy.len() {
                return Err(CoreError::invalid_spec(
                    "hardware_strategy",
                    "CPU must be the last entry",
                ));
            }
        }
        if let OutputFormat::Portrait { layout, .. } = &self.format {
            if layout.is_empty() {
                log::warn!(
                    "Portrait render without HUD elements; only the main view will be shown"
                );
            }
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(CoreError::invalid_spec("output_path", "must not be empty"));
        }
        if self.output_path == self.input_path {
            return Err(CoreError::invalid_spec(
                "output_path",
                "must differ from the input path",
            ));
        }
        if self.output_path.exists() {
            return Err(CoreError::OutputExists(self.output_path.clone()));
        }
        Ok(())
    }
}
