// hudshift-cli/src/main.rs
//
// Entry point of the `hudshift` binary.
//
// Responsibilities include:
// - Parsing command-line arguments.
// - Setting up console and file logging.
// - Layering the config file and flags over the core defaults.
// - Sweeping scratch directories left behind by earlier runs.
// - Dispatching to the subcommand and mapping its outcome to an exit code.

use clap::Parser;
use hudshift_cli::config::{STALE_SCRATCH_AGE, resolve_config};
use hudshift_cli::error::{exit_code_for_error, exit_code_for_result};
use hudshift_cli::logging::init_logging;
use hudshift_cli::{Cli, Commands, run_doctor, run_layout, run_probe, run_render};
use hudshift_core::{CoreConfig, sweep_stale};

use std::process;

fn sweep_scratch(config: &CoreConfig) {
    match sweep_stale(&config.temp_root(), STALE_SCRATCH_AGE) {
        Ok(0) => {}
        Ok(removed) => log::info!("Removed {removed} stale scratch directories"),
        Err(e) => log::warn!("Could not sweep stale scratch directories: {e}"),
    }
}

fn main() {
    let cli = Cli::parse();

    match init_logging(cli.verbose, cli.log_dir.as_deref()) {
        Ok(Some(path)) => log::debug!("Logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(hudshift_cli::EXIT_FAILURE);
        }
    }

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            process::exit(exit_code_for_error(&e));
        }
    };

    let outcome = match cli.command {
        Commands::Render(args) => {
            sweep_scratch(&config);
            run_render(args, &config).map(|result| result.as_ref().map_or(0, exit_code_for_result))
        }
        Commands::Probe(args) => run_probe(args, &config).map(|()| 0),
        Commands::Layout(args) => run_layout(args, &config).map(|()| 0),
        Commands::Doctor => run_doctor(&config).map(|()| 0),
    };

    match outcome {
        Ok(code) => process::exit(code),
        Err(e) => {
            log::error!("{e}");
            process::exit(exit_code_for_error(&e));
        }
    }
}
