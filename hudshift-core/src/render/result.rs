//! Terminal outcome of a render job.

use super::stage::StageKind;
use crate::error::{CoreError, ErrorKind};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A render that produced its output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderSuccess {
    pub output_path: PathBuf,
    pub elapsed_ms: u64,
}

/// A render that ended without output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub stage: Option<StageKind>,
    /// Trailing encoder output, oldest line first.
    pub tail: Vec<String>,
    pub elapsed_ms: u64,
}

impl RenderFailure {
    #[must_use]
    pub fn from_error(error: &CoreError, elapsed_ms: u64) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            stage: error.stage(),
            tail: error.tail().to_vec(),
            elapsed_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenderResult {
    Completed(RenderSuccess),
    Failed(RenderFailure),
}

impl RenderResult {
    #[must_use]
    pub fn failed(error: &CoreError, elapsed_ms: u64) -> Self {
        RenderResult::Failed(RenderFailure::from_error(error, elapsed_ms))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, RenderResult::Completed(_))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind() == Some(ErrorKind::Cancelled)
    }

    /// Failure kind, `None` on success.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            RenderResult::Completed(_) => None,
            RenderResult::Failed(failure) => Some(failure.kind),
        }
    }

    #[must_use]
    pub fn output_path(&self) -> Option<&Path> {
        match self {
            RenderResult::Completed(success) => Some(&success.output_path),
            RenderResult::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        match self {
            RenderResult::Completed(success) => success.elapsed_ms,
            RenderResult::Failed(failure) => failure.elapsed_ms,
        }
    }
}
