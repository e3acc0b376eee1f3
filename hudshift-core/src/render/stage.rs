// ============================================================================
// hudshift-core/src/render/stage.rs
// ============================================================================
//
// STAGE COMMANDS: One Step of a Render Plan
//
// A plan is an ordered list of stages. Each stage is either an encoder
// invocation (core clip, intro still, concat) or the in-process move of a
// finished file onto the output path. Stages carry everything the executor
// needs: the argv, the progress weight, the expected output duration, the
// encoder fallback and the final publish step.

use crate::edit::HardwareEncoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which step of the pipeline a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Core,
    Intro,
    Concat,
    /// Publishes an existing file without spawning a process.
    Move,
}

impl StageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Core => "core",
            StageKind::Intro => "intro",
            StageKind::Concat => "concat",
            StageKind::Move => "move",
        }
    }

    /// Whether the stage spawns an encoder process.
    #[must_use]
    pub fn spawns_process(self) -> bool {
        self != StageKind::Move
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alternative argv run once if the primary encoder fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackCommand {
    pub encoder: HardwareEncoder,
    pub argv: Vec<String>,
}

/// Final rename of a finished file onto the user's output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Publish {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// One step of a render plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageCommand {
    pub kind: StageKind,
    /// Encoder arguments, binary excluded. Empty for `Move`.
    pub argv: Vec<String>,
    /// Video encoder used by `argv`, if the stage encodes video.
    pub encoder: Option<HardwareEncoder>,
    /// Whether the process reports `time=` progress worth tracking.
    pub expects_progress: bool,
    /// Share of overall progress, in [0, 1].
    pub progress_weight: f64,
    /// Output duration in seconds, the denominator for stage progress.
    pub expected_duration: f64,
    /// File the stage writes.
    pub output: Option<PathBuf>,
    pub fallback: Option<FallbackCommand>,
    pub publish: Option<Publish>,
}

impl StageCommand {
    /// Label of the tool doing the work, for status and error messages.
    #[must_use]
    pub fn tool_label(&self) -> String {
        match (self.kind, self.encoder) {
            (_, Some(encoder)) => encoder.codec().to_string(),
            (StageKind::Concat, None) => "concat demuxer".to_string(),
            (kind, None) => kind.to_string(),
        }
    }

    /// Whether this stage may fall back to another encoder.
    #[must_use]
    pub fn can_fall_back(&self) -> bool {
        self.fallback.is_some() && matches!(self.kind, StageKind::Core | StageKind::Intro)
    }

    /// The argv rendered as a single shell-like line, for dry runs and logs.
    #[must_use]
    pub fn command_line(&self, program: &str) -> String {
        std::iter::once(program.to_string())
            .chain(self.argv.iter().map(|arg| quote_arg(arg)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
