// ============================================================================
// hudshift-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: fern Dispatch for Console and File Output
//
// Console lines go to stderr with a colored level tag so stdout stays free
// for JSON output. When a log directory is given, every record is also
// written without styling to `hudshift_<timestamp>.log`.
//
// KEY COMPONENTS:
// - init_logging: Installs the global logger
// - get_timestamp: Local timestamp used in log file names

use crate::error::CliResult;

use console::style;
use hudshift_core::CoreError;
use log::{Level, LevelFilter};

use std::fs;
use std::path::{Path, PathBuf};

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
///
/// # Example
/// ```
/// let log_filename = format!("hudshift_{}.log", hudshift_cli::logging::get_timestamp());
/// assert!(log_filename.starts_with("hudshift_"));
/// ```
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn level_tag(level: Level) -> String {
    let tag = format!("{level:<5}");
    match level {
        Level::Error => style(tag).red().bold().to_string(),
        Level::Warn => style(tag).yellow().to_string(),
        Level::Info => style(tag).green().to_string(),
        Level::Debug => style(tag).cyan().to_string(),
        Level::Trace => style(tag).dim().to_string(),
    }
}

/// Installs the global logger. Returns the log file path when one was opened.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> CliResult<Option<PathBuf>> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{} {}", level_tag(record.level()), message))
        })
        .chain(std::io::stderr());

    let mut root = fern::Dispatch::new()
        .level(level)
        .level_for("ffmpeg_sidecar", LevelFilter::Warn)
        .chain(console);

    let mut log_path = None;
    if let Some(dir) = log_dir {
        fs::create_dir_all(dir).map_err(|e| {
            CoreError::Config(format!("cannot create log directory '{}': {e}", dir.display()))
        })?;
        let path = dir.join(format!("hudshift_{}.log", get_timestamp()));
        let file = fern::log_file(&path)?;
        root = root.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} [{}] {}: {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(file),
        );
        log_path = Some(path);
    }

    root.apply()
        .map_err(|e| CoreError::Config(format!("logger already initialized: {e}")))?;
    Ok(log_path)
}
