//! Implementation of the 'layout' subcommands.
//!
//! `layout init` writes the built-in reference layout so it can be edited by
//! hand; `layout show` resolves a layout against a source resolution and
//! prints the crop and overlay rectangles the filter graph would use.

use crate::cli::{LayoutAction, LayoutArgs, ShowArgs};
use crate::error::CliResult;

use hudshift_core::layout::{CoordinateModel, ResolvedGeometry, SourceResolution};
use hudshift_core::{CoreConfig, CoreError, HudLayout, HudSelection, LayoutStore};

use std::path::Path;

/// Writes the reference layout to `path`. Refuses to replace an existing file.
pub fn init_layout(path: &Path) -> CliResult<()> {
    if path.exists() {
        return Err(CoreError::OutputExists(path.to_path_buf()));
    }
    LayoutStore::new(path).save(&HudLayout::reference())?;
    log::info!("Wrote reference layout to {}", path.display());
    Ok(())
}

/// Resolves the active elements of a stored layout for one source resolution.
pub fn resolve_layout(args: &ShowArgs, config: &CoreConfig) -> CliResult<ResolvedGeometry> {
    let layout = LayoutStore::new(&args.path).load()?;
    let selection = HudSelection {
        teammates_visible: args.teammates,
        boss_hp: args.boss_hp,
    };
    CoordinateModel::new(&config.geometry).to_filter_geometry(
        &layout.active(selection),
        SourceResolution::new(args.width, args.height),
    )
}

/// Main entry point for the layout command.
pub fn run_layout(args: LayoutArgs, config: &CoreConfig) -> CliResult<()> {
    match args.action {
        LayoutAction::Init { path } => init_layout(&path),
        LayoutAction::Show(show) => {
            let geometry = resolve_layout(&show, config)?;
            println!("{}", serde_json::to_string_pretty(&geometry)?);
            Ok(())
        }
    }
}
