// ============================================================================
// hudshift-core/src/external/mod.rs
// ============================================================================
//
// EXTERNAL TOOLS: Interactions with ffmpeg, ffprobe and the File System
//
// Everything the core does outside its own memory goes through the traits in
// this module: spawning encoders, probing sources and reading file sizes.
// Production implementations take absolute tool paths from the config;
// tests swap in the doubles from `mocks`.
//
// KEY COMPONENTS:
// - EncoderSpawner / EncoderProcess (ffmpeg_executor)
// - MediaProber (ffprobe_executor)
// - FileMetadataProvider
// - check_dependency for start-up diagnostics

use crate::error::{CoreError, CoreResult, command_start_error};
use std::path::Path;
use std::process::Command;

// ============================================================================
// SUBMODULES
// ============================================================================

/// Traits and the ffmpeg-sidecar implementation for encoder processes
pub mod ffmpeg_executor;

/// Source probing through ffprobe
pub mod ffprobe_executor;

/// Test doubles for the traits above
pub mod mocks;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use ffmpeg_executor::{
    EncoderEvent, EncoderProcess, EncoderSpawner, ProcessExit, SidecarProcess, SidecarSpawner,
};
pub use ffprobe_executor::{FfprobeCli, MediaProber, ProbedMedia};

// ============================================================================
// DEPENDENCY CHECKING
// ============================================================================

/// Checks that an external tool runs, returning the first line of its version banner.
///
/// The tool is invoked as `<path> -version`, which both ffmpeg and ffprobe support.
pub fn check_dependency(path: &Path) -> CoreResult<String> {
    let output = Command::new(path)
        .arg("-version")
        .output()
        .map_err(|e| command_start_error(path.display().to_string(), e))?;

    if !output.status.success() {
        log::warn!("Dependency check for '{}' exited with {}", path.display(), output.status);
        return Err(CoreError::Config(format!(
            "'{} -version' exited with {}",
            path.display(),
            output.status
        )));
    }

    let banner = String::from_utf8_lossy(&output.stdout);
    let version = banner.lines().next().unwrap_or_default().trim().to_string();
    log::debug!("Found dependency {}: {version}", path.display());
    Ok(version)
}

// ============================================================================
// FILE METADATA ACCESS
// ============================================================================

/// Abstraction over file metadata so byte budgets can be tested without real files.
pub trait FileMetadataProvider {
    /// Size of the file at `path` in bytes.
    fn get_size(&self, path: &Path) -> CoreResult<u64>;
}

/// `FileMetadataProvider` backed by `std::fs::metadata`.
#[derive(Debug, Clone, Default)]
pub struct StdFsMetadataProvider;

impl FileMetadataProvider for StdFsMetadataProvider {
    fn get_size(&self, path: &Path) -> CoreResult<u64> {
        Ok(std::fs::metadata(path)?.len())
    }
}
