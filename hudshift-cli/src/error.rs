// ============================================================================
// hudshift-cli/src/error.rs
// ============================================================================
//
// CLI ERROR HANDLING: Result alias and exit codes
//
// The CLI reports core errors unchanged; this module only fixes the exit
// status each outcome maps to.
//
// KEY COMPONENTS:
// - CliResult: Type alias for CLI operations
// - Exit codes for failure and cancellation

use hudshift_core::{CoreError, CoreResult, ErrorKind, RenderResult};

/// Type alias for CLI results using CoreError.
pub type CliResult<T> = CoreResult<T>;

/// Exit status for any failed command.
pub const EXIT_FAILURE: i32 = 1;

/// Exit status for a render cancelled with Ctrl-C (128 + SIGINT).
pub const EXIT_CANCELLED: i32 = 130;

/// Maps a command error onto the process exit status.
#[must_use]
pub fn exit_code_for_error(error: &CoreError) -> i32 {
    match error.kind() {
        ErrorKind::Cancelled => EXIT_CANCELLED,
        _ => EXIT_FAILURE,
    }
}

/// Maps a finished render onto the process exit status.
#[must_use]
pub fn exit_code_for_result(result: &RenderResult) -> i32 {
    if result.is_success() {
        0
    } else if result.is_cancelled() {
        EXIT_CANCELLED
    } else {
        EXIT_FAILURE
    }
}
