// hudshift-cli/src/config.rs
//
// Builds the CoreConfig for a run: built-in defaults, then the optional JSON
// config file, then command-line flags.

use crate::cli::Cli;
use crate::error::CliResult;

use hudshift_core::{CoreConfig, CoreConfigBuilder, CoreError};

use std::fs;
use std::path::Path;
use std::time::Duration;

/// Age after which leftover scratch directories are swept at start-up.
pub const STALE_SCRATCH_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Reads a config file. Keys it omits keep their defaults.
pub fn load_config_file(path: &Path) -> CliResult<CoreConfig> {
    let text = fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("cannot read config file '{}': {e}", path.display()))
    })?;
    let config: CoreConfig = serde_json::from_str(&text).map_err(|e| {
        CoreError::Config(format!("invalid config file '{}': {e}", path.display()))
    })?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolves the effective configuration for this invocation.
pub fn resolve_config(cli: &Cli) -> CliResult<CoreConfig> {
    let base = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => CoreConfig::default(),
    };

    let mut builder = CoreConfigBuilder::from_config(base);
    if let Some(ffmpeg) = &cli.ffmpeg {
        builder = builder.ffmpeg_path(ffmpeg);
    }
    if let Some(ffprobe) = &cli.ffprobe {
        builder = builder.ffprobe_path(ffprobe);
    }

    let config = builder.build();
    config.validate()?;
    Ok(config)
}
