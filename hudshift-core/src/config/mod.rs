//! Configuration structures and constants for the hudshift-core library.
//!
//! `CoreConfig` gathers every tunable the planner and executor use: tool
//! paths, byte budgets, fade and speed limits, the audio ducking chain, text
//! overlay fonts and the canvas safety padding. The core never reads the
//! process environment; everything arrives through this struct.

mod builder;

use crate::error::{CoreError, CoreResult};
use crate::layout::HudTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub use builder::CoreConfigBuilder;

// Default constants

/// Target file sizes in MiB for quality levels 0 through 3.
pub const DEFAULT_TARGET_SIZES_MB: [u64; 4] = [15, 25, 45, 90];

/// Audio bitrate assumed when the probe cannot report one.
pub const DEFAULT_AUDIO_KBPS: u32 = 256;

/// Video bitrate floor in kbps.
pub const MIN_VIDEO_KBPS: u32 = 300;

/// Fade length in seconds; also the amount of source required on either
/// side of the trim window before padding is applied.
pub const DEFAULT_FADE_SECONDS: f64 = 1.5;

pub const DEFAULT_MIN_SPEED: f64 = 0.1;
pub const DEFAULT_MAX_SPEED: f64 = 4.0;

/// Renders at or below this duration use constant bitrate on hardware encoders.
pub const DEFAULT_CBR_MAX_SECONDS: f64 = 20.0;

/// Time given to an encoder to quit after a cancel before it is killed.
pub const DEFAULT_CANCEL_GRACE_MS: u64 = 3000;

/// Lines of encoder output kept for diagnostics.
pub const DEFAULT_TAIL_LINES: usize = 40;

/// Portrait canvas dimensions.
pub const CANVAS_WIDTH: u32 = 1080;
pub const CANVAS_HEIGHT: u32 = 1920;

/// Sidechain compressor detection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detection {
    Rms,
    Peak,
}

impl Detection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Detection::Rms => "rms",
            Detection::Peak => "peak",
        }
    }
}

/// Parameters of the background music ducking chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckingConfig {
    pub threshold: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
    pub detection: Detection,
    /// Split point between the music bass (left untouched) and the ducked band.
    pub crossover_hz: u32,
    pub trigger_highpass_hz: u32,
    pub trigger_lowpass_hz: u32,
    pub gate_threshold: f64,
    pub limiter: f64,
    pub music_fade_seconds: f64,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            ratio: 4.0,
            attack_ms: 1.0,
            release_ms: 400.0,
            detection: Detection::Rms,
            crossover_hz: 150,
            trigger_highpass_hz: 100,
            trigger_lowpass_hz: 8000,
            gate_threshold: 0.02,
            limiter: 0.95,
            music_fade_seconds: 1.5,
        }
    }
}

/// Font discovery and sizing for the optional caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOverlayConfig {
    pub font_dirs: Vec<PathBuf>,
    /// File names tried in order; the first one found wins.
    pub font_candidates: Vec<String>,
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub top_offset: u32,
    /// Canvas rows kept free of HUD elements while a caption is shown.
    pub reserved_top: u32,
    pub shadow_offset: u32,
}

impl Default for TextOverlayConfig {
    fn default() -> Self {
        Self {
            font_dirs: vec![
                PathBuf::from("/usr/share/fonts"),
                PathBuf::from("/usr/local/share/fonts"),
                PathBuf::from("/Library/Fonts"),
                PathBuf::from("/System/Library/Fonts"),
                PathBuf::from("C:\\Windows\\Fonts"),
            ],
            font_candidates: [
                "DejaVuSans-Bold.ttf",
                "LiberationSans-Bold.ttf",
                "arialbd.ttf",
                "Arial Bold.ttf",
                "Arial.ttf",
                "Helvetica.ttc",
            ]
            .iter()
            .map(|name| (*name).to_string())
            .collect(),
            min_font_size: 36,
            max_font_size: 84,
            top_offset: 90,
            reserved_top: 220,
            shadow_offset: 2,
        }
    }
}

/// Margins inside the portrait canvas that overlays must respect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasPadding {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub padding: CanvasPadding,
    /// Per-tag `[dx, dy]` nudge applied to overlay positions before clamping.
    pub safety_bias: BTreeMap<HudTag, [i32; 2]>,
}

impl GeometryConfig {
    /// Geometry settings with no padding and no bias.
    #[must_use]
    pub fn unbiased() -> Self {
        Self {
            padding: CanvasPadding::default(),
            safety_bias: BTreeMap::new(),
        }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        // HP bars sit directly on top of the loot bar in the reference layout.
        let safety_bias = BTreeMap::from([
            (HudTag::NormalHp, [0, -2]),
            (HudTag::BossHp, [0, -2]),
        ]);
        Self {
            padding: CanvasPadding::default(),
            safety_bias,
        }
    }
}

/// Main configuration structure for the hudshift-core library.
///
/// All fields have defaults, so a config file only needs the values it
/// overrides. The builder provides the same in code:
///
/// ```rust,no_run
/// use hudshift_core::config::CoreConfigBuilder;
///
/// let config = CoreConfigBuilder::new()
///     .ffmpeg_path("/opt/ffmpeg/bin/ffmpeg")
///     .ffprobe_path("/opt/ffmpeg/bin/ffprobe")
///     .fade_seconds(1.0)
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Encoder binary used for every stage
    pub ffmpeg_path: PathBuf,

    /// Probe binary used by `FfprobeCli`
    pub ffprobe_path: PathBuf,

    /// Parent directory for job scratch directories (defaults to the OS temp dir)
    pub temp_root: Option<PathBuf>,

    /// Byte budgets in MiB for quality levels 0..3
    pub target_sizes_mb: [u64; 4],

    pub default_audio_kbps: u32,
    pub min_video_kbps: u32,
    pub fade_seconds: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub cbr_max_seconds: f64,

    pub ducking: DuckingConfig,
    pub text: TextOverlayConfig,
    pub geometry: GeometryConfig,

    /// Milliseconds between asking an encoder to quit and killing it
    pub cancel_grace_ms: u64,

    pub tail_lines: usize,

    /// Optional ntfy topic URL for completion notifications
    pub ntfy_topic: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            temp_root: None,
            target_sizes_mb: DEFAULT_TARGET_SIZES_MB,
            default_audio_kbps: DEFAULT_AUDIO_KBPS,
            min_video_kbps: MIN_VIDEO_KBPS,
            fade_seconds: DEFAULT_FADE_SECONDS,
            min_speed: DEFAULT_MIN_SPEED,
            max_speed: DEFAULT_MAX_SPEED,
            cbr_max_seconds: DEFAULT_CBR_MAX_SECONDS,
            ducking: DuckingConfig::default(),
            text: TextOverlayConfig::default(),
            geometry: GeometryConfig::default(),
            cancel_grace_ms: DEFAULT_CANCEL_GRACE_MS,
            tail_lines: DEFAULT_TAIL_LINES,
            ntfy_topic: None,
        }
    }
}

impl CoreConfig {
    /// Directory under which scratch directories are created.
    #[must_use]
    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    #[must_use]
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    /// Byte budget for a quality level below 4.
    #[must_use]
    pub fn target_bytes(&self, quality_level: u8) -> Option<u64> {
        self.target_sizes_mb
            .get(usize::from(quality_level))
            .map(|mb| mb * 1024 * 1024)
    }

    /// Checks the configuration for values the planner cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.ffmpeg_path.as_os_str().is_empty() || self.ffprobe_path.as_os_str().is_empty() {
            return Err(CoreError::Config("tool paths must not be empty".to_string()));
        }
        if self.target_sizes_mb.iter().any(|mb| *mb == 0) {
            return Err(CoreError::Config("target sizes must be positive".to_string()));
        }
        if self.min_video_kbps == 0 || self.default_audio_kbps == 0 {
            return Err(CoreError::Config("bitrates must be positive".to_string()));
        }
        if !(self.fade_seconds.is_finite() && self.fade_seconds >= 0.0) {
            return Err(CoreError::Config(format!(
                "fade_seconds must be a non-negative number, got {}",
                self.fade_seconds
            )));
        }
        if !(self.min_speed > 0.0 && self.min_speed <= 1.0 && self.max_speed >= 1.0) {
            return Err(CoreError::Config(format!(
                "speed range {}..={} must be positive and contain 1.0",
                self.min_speed, self.max_speed
            )));
        }
        if self.text.min_font_size == 0 || self.text.min_font_size > self.text.max_font_size {
            return Err(CoreError::Config(format!(
                "font size range {}..={} is invalid",
                self.text.min_font_size, self.text.max_font_size
            )));
        }
        let ducking = &self.ducking;
        if !(ducking.threshold > 0.0 && ducking.threshold <= 1.0) || ducking.ratio < 1.0 {
            return Err(CoreError::Config(
                "ducking threshold must be in (0, 1] and ratio at least 1".to_string(),
            ));
        }
        if !(ducking.limiter > 0.0 && ducking.limiter <= 1.0) {
            return Err(CoreError::Config("limiter must be in (0, 1]".to_string()));
        }
        let padding = self.geometry.padding;
        if padding.left + padding.right >= CANVAS_WIDTH
            || padding.top + padding.bottom + self.text.reserved_top >= CANVAS_HEIGHT
        {
            return Err(CoreError::Config("canvas padding leaves no room".to_string()));
        }
        if self.tail_lines == 0 {
            return Err(CoreError::Config("tail_lines must be at least 1".to_string()));
        }
        Ok(())
    }
}
