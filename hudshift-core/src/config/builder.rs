// ============================================================================
// hudshift-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for CoreConfig
//
// Fluent construction of CoreConfig. Every setter is optional; unset fields
// keep the defaults from CoreConfig::default().

use std::path::PathBuf;

use super::{CoreConfig, DuckingConfig, GeometryConfig, TextOverlayConfig};

/// Builder for creating CoreConfig instances.
#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from a file.
    #[must_use]
    pub fn from_config(config: CoreConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffmpeg_path = path.into();
        self
    }

    #[must_use]
    pub fn ffprobe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffprobe_path = path.into();
        self
    }

    #[must_use]
    pub fn temp_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(path.into());
        self
    }

    #[must_use]
    pub fn target_sizes_mb(mut self, sizes: [u64; 4]) -> Self {
        self.config.target_sizes_mb = sizes;
        self
    }

    #[must_use]
    pub fn default_audio_kbps(mut self, kbps: u32) -> Self {
        self.config.default_audio_kbps = kbps;
        self
    }

    #[must_use]
    pub fn fade_seconds(mut self, seconds: f64) -> Self {
        self.config.fade_seconds = seconds;
        self
    }

    #[must_use]
    pub fn speed_range(mut self, min: f64, max: f64) -> Self {
        self.config.min_speed = min;
        self.config.max_speed = max;
        self
    }

    #[must_use]
    pub fn ducking(mut self, ducking: DuckingConfig) -> Self {
        self.config.ducking = ducking;
        self
    }

    #[must_use]
    pub fn text(mut self, text: TextOverlayConfig) -> Self {
        self.config.text = text;
        self
    }

    #[must_use]
    pub fn geometry(mut self, geometry: GeometryConfig) -> Self {
        self.config.geometry = geometry;
        self
    }

    #[must_use]
    pub fn cancel_grace_ms(mut self, millis: u64) -> Self {
        self.config.cancel_grace_ms = millis;
        self
    }

    #[must_use]
    pub fn ntfy_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.ntfy_topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn build(self) -> CoreConfig {
        self.config
    }
}
