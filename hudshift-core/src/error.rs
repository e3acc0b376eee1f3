// ============================================================================
// hudshift-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Custom Error Types for Hudshift Core
//
// This module defines the error taxonomy of the render planner and executor.
// Every failure a render can end with maps onto a flat `ErrorKind`, which is
// what observers and the CLI report. Stage failures carry the stage and the
// trailing lines of encoder output so callers can show diagnostics.
//
// KEY COMPONENTS:
// - CoreError: Main error enum with variants for each failure category
// - ErrorKind: Flat, copyable classification used in render results
// - CoreResult: Type alias for Result<T, CoreError>
// - Helper functions for building process errors

use crate::layout::HudTag;
use crate::render::stage::StageKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Flat classification of render failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ProbeFailed,
    InvalidEditSpec,
    InvalidGeometry,
    EmptyDuration,
    DurationTooShortForBudget,
    EncoderFailed,
    ConcatFailed,
    Cancelled,
    TempIOFailed,
    PlanInvariantBroken,
    OutputExists,
    Config,
    Io,
    Notification,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Custom error type for hudshift-core.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to probe '{}': {reason}", .path.display())]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("Invalid edit spec field '{field}': {reason}")]
    InvalidEditSpec { field: &'static str, reason: String },

    #[error("Invalid geometry for HUD element '{tag}': {reason}")]
    InvalidGeometry { tag: HudTag, reason: String },

    #[error("Effective duration is empty ({0:.3}s)")]
    EmptyDuration(f64),

    #[error(
        "A {duration_secs:.2}s render cannot fit a {target_mb} MB budget with {audio_kbps} kbps audio; raise the quality level"
    )]
    DurationTooShortForBudget {
        duration_secs: f64,
        target_mb: u64,
        audio_kbps: u32,
    },

    #[error("{stage} stage failed with {encoder} ({})", describe_exit(.exit_code))]
    EncoderFailed {
        stage: StageKind,
        encoder: String,
        exit_code: Option<i32>,
        tail: Vec<String>,
    },

    #[error("Concatenation failed ({})", describe_exit(.exit_code))]
    ConcatFailed {
        exit_code: Option<i32>,
        tail: Vec<String>,
    },

    #[error("Render cancelled during {stage} stage")]
    Cancelled { stage: StageKind },

    #[error("Temporary file operation failed on '{}': {source}", .path.display())]
    TempIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Plan invariant broken: {0}")]
    PlanInvariantBroken(String),

    #[error("Output path already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("Failed to start command '{cmd}': {source}")]
    CommandStart {
        cmd: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed while waiting for command '{cmd}': {source}")]
    CommandWait {
        cmd: String,
        #[source]
        source: io::Error,
    },

    #[error("Layout document error: {0}")]
    Layout(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

impl CoreError {
    /// Flat kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProbeFailed { .. } => ErrorKind::ProbeFailed,
            CoreError::InvalidEditSpec { .. } => ErrorKind::InvalidEditSpec,
            CoreError::InvalidGeometry { .. } => ErrorKind::InvalidGeometry,
            CoreError::EmptyDuration(_) => ErrorKind::EmptyDuration,
            CoreError::DurationTooShortForBudget { .. } => ErrorKind::DurationTooShortForBudget,
            CoreError::EncoderFailed { .. }
            | CoreError::CommandStart { .. }
            | CoreError::CommandWait { .. } => ErrorKind::EncoderFailed,
            CoreError::ConcatFailed { .. } => ErrorKind::ConcatFailed,
            CoreError::Cancelled { .. } => ErrorKind::Cancelled,
            CoreError::TempIo { .. } => ErrorKind::TempIOFailed,
            CoreError::PlanInvariantBroken(_) => ErrorKind::PlanInvariantBroken,
            CoreError::OutputExists(_) => ErrorKind::OutputExists,
            CoreError::Config(_) | CoreError::Layout(_) | CoreError::Json(_) => ErrorKind::Config,
            CoreError::Io(_) => ErrorKind::Io,
            CoreError::Notification(_) => ErrorKind::Notification,
        }
    }

    /// Stage the error was raised in, if it came from a running stage.
    #[must_use]
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            CoreError::EncoderFailed { stage, .. } | CoreError::Cancelled { stage } => Some(*stage),
            CoreError::ConcatFailed { .. } => Some(StageKind::Concat),
            _ => None,
        }
    }

    /// Trailing encoder output attached to the error.
    #[must_use]
    pub fn tail(&self) -> &[String] {
        match self {
            CoreError::EncoderFailed { tail, .. } | CoreError::ConcatFailed { tail, .. } => tail,
            _ => &[],
        }
    }

    pub(crate) fn invalid_spec(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidEditSpec {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn temp_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CoreError::TempIo {
            path: path.into(),
            source,
        }
    }
}

/// Result type used throughout hudshift-core.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Creates a `CommandStart` error.
pub fn command_start_error(cmd: impl Into<String>, source: io::Error) -> CoreError {
    CoreError::CommandStart {
        cmd: cmd.into(),
        source,
    }
}

/// Creates a `CommandWait` error.
pub fn command_wait_error(cmd: impl Into<String>, source: io::Error) -> CoreError {
    CoreError::CommandWait {
        cmd: cmd.into(),
        source,
    }
}

/// Creates the failure error for a stage whose process exited unsuccessfully.
pub fn command_failed_error(
    stage: StageKind,
    encoder: impl Into<String>,
    exit_code: Option<i32>,
    tail: Vec<String>,
) -> CoreError {
    match stage {
        StageKind::Concat | StageKind::Move => CoreError::ConcatFailed { exit_code, tail },
        StageKind::Core | StageKind::Intro => CoreError::EncoderFailed {
            stage,
            encoder: encoder.into(),
            exit_code,
            tail,
        },
    }
}
