//! Implementation of the 'probe' subcommand.

use crate::cli::ProbeArgs;
use crate::error::CliResult;

use hudshift_core::CoreConfig;
use hudshift_core::external::{FfprobeCli, MediaProber};

/// Probes a source with ffprobe and prints what the planner will see.
pub fn run_probe(args: ProbeArgs, config: &CoreConfig) -> CliResult<()> {
    let probed = FfprobeCli::new(&config.ffprobe_path).probe(&args.input)?;
    log::info!(
        "{}: {}x{}, {}",
        args.input.display(),
        probed.width,
        probed.height,
        hudshift_core::format_duration(probed.duration_seconds)
    );
    println!("{}", serde_json::to_string_pretty(&probed)?);
    Ok(())
}
