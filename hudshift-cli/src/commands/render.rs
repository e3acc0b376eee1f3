//! Implementation of the 'render' subcommand.
//!
//! Loads an edit description from a job file, applies the command-line
//! overrides and hands the job to hudshift-core. Ctrl-C cancels the running
//! stage; the core removes every intermediate and partial file before the
//! result is reported.

use crate::cli::RenderArgs;
use crate::error::CliResult;
use crate::progress::ProgressBarObserver;

use hudshift_core::external::{FfprobeCli, SidecarSpawner, StdFsMetadataProvider};
use hudshift_core::{
    CancelToken, CoreConfig, CoreError, EditSpec, LayoutStore, LoggingObserver, NotifyingObserver,
    NtfySender, ObserverSet, OutputFormat, PipelinePlanner, RenderObserver, RenderResult,
    render_job,
};

use log::{debug, info, warn};

use std::fs;
use std::path::Path;

/// Reads and parses a job file.
pub fn load_job(path: &Path) -> CliResult<EditSpec> {
    let text = fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("cannot read job file '{}': {e}", path.display()))
    })?;
    serde_json::from_str(&text).map_err(|e| CoreError::InvalidEditSpec {
        field: "job",
        reason: format!("'{}' is not a valid edit description: {e}", path.display()),
    })
}

/// Applies `--output` and `--layout` to a loaded job.
pub fn apply_overrides(mut spec: EditSpec, args: &RenderArgs) -> CliResult<EditSpec> {
    if let Some(output) = &args.output {
        spec.output_path = output.clone();
    }

    if let Some(layout_path) = &args.layout {
        match &mut spec.format {
            OutputFormat::Portrait { layout, .. } => {
                *layout = LayoutStore::new(layout_path).load()?;
                debug!("Using layout from {}", layout_path.display());
            }
            OutputFormat::Landscape { .. } => {
                warn!(
                    "Ignoring layout {}: landscape renders have no HUD overlays",
                    layout_path.display()
                );
            }
        }
    }

    Ok(spec)
}

/// Plans the job and prints the stages as JSON without running anything.
fn dry_run(spec: &EditSpec, config: &CoreConfig) -> CliResult<()> {
    let prober = FfprobeCli::new(&config.ffprobe_path);
    let plan = PipelinePlanner::new(config, &prober, &StdFsMetadataProvider).plan(spec)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    plan.discard()
}

fn install_cancel_handler(cancel: &CancelToken) -> CliResult<()> {
    let token = cancel.clone();
    ctrlc::set_handler(move || {
        if !token.is_cancelled() {
            eprintln!("\nCancelling render, cleaning up...");
        }
        token.cancel();
    })
    .map_err(|e| CoreError::Config(format!("cannot install Ctrl-C handler: {e}")))
}

/// Main entry point for the render command.
///
/// Returns `None` for a dry run, otherwise the finished render's result.
pub fn run_render(args: RenderArgs, config: &CoreConfig) -> CliResult<Option<RenderResult>> {
    let spec = apply_overrides(load_job(&args.job)?, &args)?;
    info!(
        "Rendering {} -> {}",
        spec.input_path.display(),
        spec.output_path.display()
    );

    if args.dry_run {
        dry_run(&spec, config)?;
        return Ok(None);
    }

    let cancel = CancelToken::new();
    install_cancel_handler(&cancel)?;

    let topic = args.ntfy.clone().or_else(|| config.ntfy_topic.clone());
    let notifier = match topic.as_deref() {
        Some(url) => {
            let sender = NtfySender::new(url)?;
            debug!("Sending notifications to {}", sender.topic_url());
            Some(NotifyingObserver::new(sender, spec.input_path.clone()))
        }
        None => None,
    };

    let progress = ProgressBarObserver::new();
    let logging = LoggingObserver::new();
    let mut observers = ObserverSet::new().with(&progress).with(&logging);
    if let Some(notifier) = &notifier {
        observers = observers.with(notifier as &dyn RenderObserver);
    }

    let result = render_job(
        config,
        &SidecarSpawner::new(&config.ffmpeg_path),
        &FfprobeCli::new(&config.ffprobe_path),
        &StdFsMetadataProvider,
        &spec,
        &observers,
        &cancel,
    );

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(job: &Path) -> RenderArgs {
        RenderArgs {
            job: job.to_path_buf(),
            layout: None,
            output: None,
            dry_run: true,
            ntfy: None,
        }
    }

    const LANDSCAPE_JOB: &str = r#"{
        "input_path": "/videos/raid.mp4",
        "trim_start_ms": 1000,
        "trim_end_ms": 9000,
        "format": { "type": "landscape" },
        "output_path": "/videos/out/raid_short.mp4"
    }"#;

    #[test]
    fn job_defaults_fill_optional_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let job = dir.path().join("job.json");
        fs::write(&job, LANDSCAPE_JOB).expect("write");

        let spec = load_job(&job).expect("job");
        assert_eq!(spec.speed_factor, 1.0);
        assert_eq!(spec.quality_level, 0);
        assert!(spec.background_music.is_none());
        assert!(!spec.format.is_portrait());
    }

    #[test]
    fn output_flag_replaces_job_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let job = dir.path().join("job.json");
        fs::write(&job, LANDSCAPE_JOB).expect("write");

        let mut render_args = args(&job);
        render_args.output = Some(PathBuf::from("/tmp/elsewhere.mp4"));
        let spec = apply_overrides(load_job(&job).expect("job"), &render_args).expect("overrides");
        assert_eq!(spec.output_path, PathBuf::from("/tmp/elsewhere.mp4"));
    }

    #[test]
    fn layout_flag_replaces_portrait_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout_path = dir.path().join("layout.json");
        let custom = hudshift_core::HudLayout::reference()
            .active(hudshift_core::HudSelection {
                teammates_visible: false,
                boss_hp: false,
            });
        LayoutStore::new(&layout_path).save(&custom).expect("save");

        let job = dir.path().join("job.json");
        fs::write(
            &job,
            r#"{
                "input_path": "/videos/raid.mp4",
                "trim_start_ms": 0,
                "trim_end_ms": 5000,
                "format": { "type": "portrait" },
                "output_path": "/videos/out/raid_short.mp4"
            }"#,
        )
        .expect("write");

        let mut render_args = args(&job);
        render_args.layout = Some(layout_path);
        let spec = apply_overrides(load_job(&job).expect("job"), &render_args).expect("overrides");
        match spec.format {
            OutputFormat::Portrait { layout, .. } => assert_eq!(layout.len(), custom.len()),
            other => panic!("unexpected format {other:?}"),
        }
    }

    #[test]
    fn malformed_job_is_an_edit_spec_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let job = dir.path().join("job.json");
        fs::write(&job, r#"{ "input_path": 3 }"#).expect("write");

        let err = load_job(&job).expect_err("malformed");
        assert_eq!(err.kind(), hudshift_core::ErrorKind::InvalidEditSpec);
    }
}
