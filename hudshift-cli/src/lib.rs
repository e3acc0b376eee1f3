// hudshift-cli/src/lib.rs
//
// Library portion of the Hudshift CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod progress;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, Commands, LayoutAction, LayoutArgs, ProbeArgs, RenderArgs, ShowArgs};
pub use commands::doctor::run_doctor;
pub use commands::layout::run_layout;
pub use commands::probe::run_probe;
pub use commands::render::run_render;
pub use error::{CliResult, EXIT_CANCELLED, EXIT_FAILURE};
