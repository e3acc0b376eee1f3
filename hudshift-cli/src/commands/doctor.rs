//! Implementation of the 'doctor' subcommand.

use crate::error::CliResult;

use console::style;
use hudshift_core::external::check_dependency;
use hudshift_core::{CoreConfig, CoreError};

use std::path::Path;

/// Runs `-version` on ffmpeg and ffprobe and prints one line per tool.
///
/// Fails when either tool cannot be run.
pub fn run_doctor(config: &CoreConfig) -> CliResult<()> {
    let tools: [(&str, &Path); 2] = [
        ("ffmpeg", config.ffmpeg_path.as_path()),
        ("ffprobe", config.ffprobe_path.as_path()),
    ];

    let mut missing = Vec::new();
    for (name, path) in tools {
        match check_dependency(path) {
            Ok(version) => println!("{} {name}: {version}", style("✓").green().bold()),
            Err(e) => {
                println!("{} {name}: {e}", style("✗").red().bold());
                missing.push(name);
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Config(format!(
            "required tools unavailable: {}",
            missing.join(", ")
        )))
    }
}
