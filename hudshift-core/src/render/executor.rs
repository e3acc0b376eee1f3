// ============================================================================
// hudshift-core/src/render/executor.rs
// ============================================================================
//
// PIPELINE EXECUTOR: Sequential Stage Execution with Fallback and Cleanup
//
// Stages run strictly one after another, one encoder process at a time. The
// executor turns encoder timestamps into weighted overall progress, retries
// a failed encode once with the next encoder of the chain, honours the
// cancel token at every encoder event and at least every poll interval,
// publishes the finished file without ever overwriting an existing one, and
// releases the temp scope on every exit path.
//
// Once a stage has downshifted to its fallback encoder, later stages start
// on the fallback directly so intro and core share a codec for concat.

use super::planner::RenderPlan;
use super::result::{RenderResult, RenderSuccess};
use super::stage::{StageCommand, StageKind};
use crate::cancel::CancelToken;
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult, ErrorKind, command_failed_error};
use crate::external::{EncoderProcess, EncoderSpawner};
use crate::progress_reporting::ffmpeg_handler::StageProgressHandler;
use crate::progress_reporting::{ProgressAccumulator, RenderObserver};
use crate::temp_files::partial_output_path;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

/// Longest a running stage goes without checking the cancel token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Runs render plans through an encoder spawner.
pub struct PipelineExecutor<'a, S: EncoderSpawner> {
    spawner: &'a S,
    grace: Duration,
    tail_lines: usize,
}

impl<'a, S: EncoderSpawner> PipelineExecutor<'a, S> {
    pub fn new(spawner: &'a S, config: &CoreConfig) -> Self {
        Self {
            spawner,
            grace: config.cancel_grace(),
            tail_lines: config.tail_lines,
        }
    }

    /// Runs every stage of `plan` and reports the outcome to `observer`.
    ///
    /// `on_finished` is called exactly once. The plan's temp scope is gone
    /// when this returns, whatever the outcome.
    pub fn run(
        &self,
        plan: RenderPlan,
        observer: &dyn RenderObserver,
        cancel: &CancelToken,
    ) -> RenderResult {
        let started = Instant::now();
        let (stages, output_path, notices, scope) = plan.into_parts();
        for notice in &notices {
            observer.on_status(notice);
        }

        let mut progress = ProgressAccumulator::new(observer);
        let outcome = self.run_stages(&stages, &mut progress, observer, cancel);
        if outcome.is_err() {
            remove_partial_outputs(&stages);
        }
        let cleanup = scope.release();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(()) => {
                if let Err(e) = cleanup {
                    log::warn!("Render finished but temp cleanup failed: {e}");
                }
                progress.finish();
                RenderResult::Completed(RenderSuccess {
                    output_path,
                    elapsed_ms,
                })
            }
            Err(error) => {
                if let Err(e) = cleanup {
                    log::warn!("Temp cleanup after failed render also failed: {e}");
                }
                if error.kind() == ErrorKind::Cancelled {
                    log::info!("{error}");
                } else {
                    log::error!("Render failed: {error}");
                }
                RenderResult::failed(&error, elapsed_ms)
            }
        };
        observer.on_finished(&result);
        result
    }

    fn run_stages(
        &self,
        stages: &[StageCommand],
        progress: &mut ProgressAccumulator<'_>,
        observer: &dyn RenderObserver,
        cancel: &CancelToken,
    ) -> CoreResult<()> {
        let mut downshifted = false;
        for stage in stages {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled { stage: stage.kind });
            }
            log::info!("Starting {} stage", stage.kind);

            if stage.kind.spawns_process() {
                observer.on_status(&stage_status(stage, downshifted));
                progress.report(stage.progress_weight, 0.0);
                let used_fallback =
                    self.run_process_stage(stage, downshifted, progress, observer, cancel)?;
                downshifted |= used_fallback;
            }

            if let Some(publish) = &stage.publish {
                if cancel.is_cancelled() {
                    return Err(CoreError::Cancelled { stage: stage.kind });
                }
                observer.on_status("Finalizing output");
                publish_output(&publish.from, &publish.to)?;
                log::info!("Wrote {}", publish.to.display());
            }
            progress.complete_stage(stage.progress_weight);
        }
        Ok(())
    }

    /// Runs one process stage, returning whether it ended on the fallback encoder.
    fn run_process_stage(
        &self,
        stage: &StageCommand,
        start_on_fallback: bool,
        progress: &mut ProgressAccumulator<'_>,
        observer: &dyn RenderObserver,
        cancel: &CancelToken,
    ) -> CoreResult<bool> {
        if start_on_fallback && stage.can_fall_back() {
            if let Some(fallback) = &stage.fallback {
                self.run_attempt(
                    stage,
                    &fallback.argv,
                    fallback.encoder.codec(),
                    progress,
                    cancel,
                )?;
                return Ok(true);
            }
        }

        let label = stage.tool_label();
        match self.run_attempt(stage, &stage.argv, &label, progress, cancel) {
            Ok(()) => Ok(false),
            Err(error) if error.kind() == ErrorKind::EncoderFailed && stage.can_fall_back() => {
                let Some(fallback) = &stage.fallback else {
                    return Err(error);
                };
                log::warn!(
                    "{} stage failed with {label}: {error}; retrying with {}",
                    stage.kind,
                    fallback.encoder
                );
                observer.on_status(&format!("GPU failed, retrying with {}", fallback.encoder));
                if let Some(output) = &stage.output {
                    remove_if_exists(output);
                }
                self.run_attempt(
                    stage,
                    &fallback.argv,
                    fallback.encoder.codec(),
                    progress,
                    cancel,
                )?;
                Ok(true)
            }
            Err(error) => Err(error),
        }
    }

    fn run_attempt(
        &self,
        stage: &StageCommand,
        argv: &[String],
        label: &str,
        progress: &mut ProgressAccumulator<'_>,
        cancel: &CancelToken,
    ) -> CoreResult<()> {
        log::debug!("{} stage with {label}: {argv:?}", stage.kind);
        let mut process = self.spawner.spawn(argv)?;
        let mut handler = StageProgressHandler::new(stage.expected_duration, self.tail_lines);

        let streamed = process.handle_events(CANCEL_POLL_INTERVAL, |event| {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled { stage: stage.kind });
            }
            let Some(event) = event else {
                return Ok(());
            };
            if let Some(fraction) = handler.handle_event(event) {
                if stage.expects_progress {
                    progress.report(stage.progress_weight, fraction);
                }
            }
            Ok(())
        });
        if let Err(error) = streamed {
            self.stop(&mut process, stage.kind);
            return Err(error);
        }
        if cancel.is_cancelled() {
            self.stop(&mut process, stage.kind);
            return Err(CoreError::Cancelled { stage: stage.kind });
        }

        let exit = process.wait()?;
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled { stage: stage.kind });
        }
        if !exit.success() {
            let tail = handler.tail();
            log::error!("{} stage with {label} exited with {:?}", stage.kind, exit.code);
            return Err(command_failed_error(stage.kind, label, exit.code, tail));
        }
        Ok(())
    }

    fn stop<P: EncoderProcess>(&self, process: &mut P, kind: StageKind) {
        log::info!("Stopping {kind} stage encoder");
        if let Err(e) = process.terminate(self.grace) {
            log::warn!("Could not stop {kind} stage encoder cleanly: {e}");
        }
    }
}

fn stage_status(stage: &StageCommand, downshifted: bool) -> String {
    let encoder = match (&stage.fallback, downshifted && stage.can_fall_back()) {
        (Some(fallback), true) => Some(fallback.encoder),
        _ => stage.encoder,
    };
    match (stage.kind, encoder) {
        (StageKind::Core, Some(encoder)) => format!("Encoding clip with {encoder}"),
        (StageKind::Intro, Some(encoder)) => format!("Rendering intro still with {encoder}"),
        (StageKind::Concat, _) => "Joining intro and clip".to_string(),
        (kind, _) => format!("Running {kind} stage"),
    }
}

/// Moves `from` to `to` without replacing an existing `to`.
///
/// A hard link fails atomically when `to` exists. Across filesystems the file
/// is copied to a hidden sibling of `to` first, so `to` only ever appears
/// complete.
pub fn publish_output(from: &Path, to: &Path) -> CoreResult<()> {
    match fs::hard_link(from, to) {
        Ok(()) => {
            remove_if_exists(from);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(CoreError::OutputExists(to.to_path_buf()))
        }
        Err(e) => {
            log::debug!("Hard link {} -> {} failed ({e}); copying", from.display(), to.display());
            copy_into_place(from, to)
        }
    }
}

fn copy_into_place(from: &Path, to: &Path) -> CoreResult<()> {
    let staging = partial_output_path(to);
    let placed = fs::copy(from, &staging)
        .and_then(|_| fs::hard_link(&staging, to).or_else(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                Err(e)
            } else if to.exists() {
                Err(io::Error::new(io::ErrorKind::AlreadyExists, "output appeared during copy"))
            } else {
                fs::rename(&staging, to)
            }
        }));
    remove_if_exists(&staging);
    match placed {
        Ok(()) => {
            remove_if_exists(from);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(CoreError::OutputExists(to.to_path_buf()))
        }
        Err(e) => Err(CoreError::temp_io(to, e)),
    }
}

/// Removes stage outputs that live outside the temp scope.
fn remove_partial_outputs(stages: &[StageCommand]) {
    for stage in stages {
        if let Some(publish) = &stage.publish {
            if publish.from != publish.to {
                remove_if_exists(&publish.from);
            }
        }
    }
}

fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_moves_file_into_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = dir.path().join("core.mp4");
        let to = dir.path().join("final.mp4");
        fs::write(&from, b"video").expect("write");

        publish_output(&from, &to).expect("publish");
        assert!(!from.exists());
        assert_eq!(fs::read(&to).expect("read"), b"video");
    }

    #[test]
    fn publish_never_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = dir.path().join("core.mp4");
        let to = dir.path().join("final.mp4");
        fs::write(&from, b"new").expect("write");
        fs::write(&to, b"old").expect("write");

        let err = publish_output(&from, &to).expect_err("exists");
        assert!(matches!(err, CoreError::OutputExists(_)));
        assert_eq!(fs::read(&to).expect("read"), b"old");
    }

    #[test]
    fn copy_fallback_leaves_no_staging_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = dir.path().join("core.mp4");
        let to = dir.path().join("final.mp4");
        fs::write(&from, b"video").expect("write");

        copy_into_place(&from, &to).expect("copy");
        let names: Vec<String> = fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["final.mp4".to_string()]);
    }
}
