//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

/// Module containing the implementation of the `render` command.
/// This command plans a job file and runs the ffmpeg pipeline.
pub mod render;

/// Module containing the implementation of the `probe` command.
pub mod probe;

/// Module containing the `layout init` and `layout show` commands.
pub mod layout;

/// Module containing the implementation of the `doctor` command.
pub mod doctor;
