// hudshift-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Hudshift: Portrait renders of gameplay footage",
    long_about = "Plans and runs ffmpeg pipelines that reframe gameplay clips into 1080x1920 \
                  portrait videos with the HUD lifted onto the canvas."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the ffmpeg binary (default: `ffmpeg` on PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary (default: `ffprobe` on PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub ffprobe: Option<PathBuf>,

    /// JSON config file overriding the built-in defaults
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for a plain-text log file of this run
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log debug output, including ffmpeg argument lists and filter graphs
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plans and runs the render described by a job file
    Render(RenderArgs),
    /// Prints what the planner sees in a source file
    Probe(ProbeArgs),
    /// Creates or inspects HUD layout documents
    Layout(LayoutArgs),
    /// Checks that ffmpeg and ffprobe can be run
    Doctor,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Edit description (JSON)
    #[arg(short, long, value_name = "JOB_FILE")]
    pub job: PathBuf,

    /// Layout document replacing the job's HUD layout (portrait renders only)
    #[arg(short, long, value_name = "LAYOUT_FILE")]
    pub layout: Option<PathBuf>,

    /// Output file replacing the job's output path
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Print the planned stages as JSON without launching ffmpeg
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Optional: ntfy topic URL for completion notifications (e.g., https://ntfy.sh/your_topic)
    /// Can also be set via the HUDSHIFT_NTFY_TOPIC environment variable.
    #[arg(long, value_name = "TOPIC_URL", env = "HUDSHIFT_NTFY_TOPIC")]
    pub ntfy: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Source video to probe
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
}

#[derive(Args, Debug)]
pub struct LayoutArgs {
    #[command(subcommand)]
    pub action: LayoutAction,
}

#[derive(Subcommand, Debug)]
pub enum LayoutAction {
    /// Writes the built-in reference layout to a file
    Init {
        /// Destination layout document
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Prints the crop and overlay geometry a layout resolves to
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Layout document to resolve
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Source width in pixels
    #[arg(long, value_name = "PIXELS")]
    pub width: u32,

    /// Source height in pixels
    #[arg(long, value_name = "PIXELS")]
    pub height: u32,

    /// Use the boss HP bar instead of the normal one
    #[arg(long, default_value_t = false)]
    pub boss_hp: bool,

    /// Include the teammates panel
    #[arg(long, default_value_t = false)]
    pub teammates: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "hudshift",
            "render",
            "--job",
            "job.json",
            "--dry-run",
            "--ffmpeg",
            "/opt/ffmpeg/bin/ffmpeg",
            "-v",
        ])
        .expect("parse");
        assert!(cli.verbose);
        assert_eq!(cli.ffmpeg, Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")));
        match cli.command {
            Commands::Render(args) => {
                assert!(args.dry_run);
                assert_eq!(args.job, PathBuf::from("job.json"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn layout_show_requires_dimensions() {
        let err = Cli::try_parse_from([
            "hudshift",
            "layout",
            "show",
            "layout.json",
            "--width",
            "1920",
        ])
        .expect_err("missing height");
        assert!(err.to_string().contains("--height"));
    }
}
