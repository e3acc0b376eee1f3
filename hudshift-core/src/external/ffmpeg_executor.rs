// ============================================================================
// hudshift-core/src/external/ffmpeg_executor.rs
// ============================================================================
//
// FFMPEG EXECUTOR: Encoder Process Management and Abstraction
//
// Traits for spawning an encoder process and consuming its output, plus the
// production implementation over ffmpeg-sidecar. Sidecar events are
// translated into the crate's own EncoderEvent so the executor and the test
// doubles never depend on sidecar types.
//
// KEY COMPONENTS:
// - EncoderEvent: Progress, log line or error reported by a running encoder
// - EncoderProcess: A running encoder (events, wait, terminate)
// - EncoderSpawner: Starts encoder processes from an argv
// - SidecarSpawner / SidecarProcess: ffmpeg-sidecar backed implementation
//
// Sidecar events are drained on a reader thread into a channel, so a silent
// encoder still hands control back to the caller every poll interval.

use crate::error::{CoreResult, command_start_error, command_wait_error};
use crate::utils::parse_ffmpeg_time;
use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Interval at which a terminating process is polled for exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Something an encoder reported while running.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderEvent {
    /// Output timestamp reached, in seconds.
    Progress { time_secs: f64 },
    /// An informational or warning output line.
    Line(String),
    /// An error line.
    Error(String),
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    #[must_use]
    pub fn success(self) -> bool {
        self.code == Some(0)
    }
}

/// Trait representing an active encoder process.
pub trait EncoderProcess {
    /// Feeds every event the process emits to `handler` until its output ends.
    ///
    /// `handler` receives `None` whenever `poll_interval` passes without
    /// output. An error returned by the handler stops consumption and is
    /// returned unchanged; the process keeps running until terminated or
    /// waited on.
    fn handle_events<F>(&mut self, poll_interval: Duration, handler: F) -> CoreResult<()>
    where
        F: FnMut(Option<EncoderEvent>) -> CoreResult<()>;

    /// Waits for the process to exit.
    fn wait(&mut self) -> CoreResult<ProcessExit>;

    /// Asks the process to stop, killing it if it is still alive after `grace`.
    fn terminate(&mut self, grace: Duration) -> CoreResult<()>;
}

/// Trait representing something that can start encoder processes.
pub trait EncoderSpawner {
    type Process: EncoderProcess;

    /// Starts the encoder with the given arguments (binary excluded).
    fn spawn(&self, args: &[String]) -> CoreResult<Self::Process>;
}

// --- Concrete Implementation using ffmpeg-sidecar ---

/// Wrapper around `ffmpeg_sidecar::child::FfmpegChild`.
pub struct SidecarProcess(FfmpegChild);

impl EncoderProcess for SidecarProcess {
    fn handle_events<F>(&mut self, poll_interval: Duration, mut handler: F) -> CoreResult<()>
    where
        F: FnMut(Option<EncoderEvent>) -> CoreResult<()>,
    {
        let iterator = self.0.iter().map_err(|e| {
            log::error!("Failed to read ffmpeg output: {e}");
            command_wait_error("ffmpeg (event stream)", std::io::Error::other(e.to_string()))
        })?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for event in iterator.filter_map(translate_event) {
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        loop {
            match rx.recv_timeout(poll_interval) {
                Ok(event) => handler(Some(event))?,
                Err(RecvTimeoutError::Timeout) => handler(None)?,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }

    fn wait(&mut self) -> CoreResult<ProcessExit> {
        self.0
            .wait()
            .map(|status| ProcessExit {
                code: status.code(),
            })
            .map_err(|e| command_wait_error("ffmpeg", e))
    }

    fn terminate(&mut self, grace: Duration) -> CoreResult<()> {
        // ffmpeg finishes cleanly when it reads `q` on stdin.
        if let Err(e) = self.0.quit() {
            log::debug!("Could not send quit to ffmpeg: {e}");
        }

        let deadline = Instant::now() + grace;
        loop {
            match self.0.as_inner_mut().try_wait() {
                Ok(Some(status)) => {
                    log::debug!("ffmpeg exited after quit request: {status}");
                    return Ok(());
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL_INTERVAL),
                Ok(None) => break,
                Err(e) => return Err(command_wait_error("ffmpeg", e)),
            }
        }

        log::warn!("ffmpeg still running {grace:?} after quit request, killing it");
        self.0.kill().map_err(|e| command_wait_error("ffmpeg (kill)", e))?;
        self.0
            .wait()
            .map(|_| ())
            .map_err(|e| command_wait_error("ffmpeg (reap)", e))
    }
}

/// `EncoderSpawner` running the configured ffmpeg binary through ffmpeg-sidecar.
#[derive(Debug, Clone)]
pub struct SidecarSpawner {
    ffmpeg_path: PathBuf,
}

impl SidecarSpawner {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl EncoderSpawner for SidecarSpawner {
    type Process = SidecarProcess;

    fn spawn(&self, args: &[String]) -> CoreResult<Self::Process> {
        let mut cmd = FfmpegCommand::new_with_path(&self.ffmpeg_path);
        cmd.args(args);
        log::debug!("Spawning {}: {:?}", self.ffmpeg_path.display(), args);
        cmd.spawn()
            .map(SidecarProcess)
            .map_err(|e| command_start_error(self.ffmpeg_path.display().to_string(), e))
    }
}

fn translate_event(event: FfmpegEvent) -> Option<EncoderEvent> {
    match event {
        FfmpegEvent::Progress(progress) => {
            parse_ffmpeg_time(&progress.time).map(|time_secs| EncoderEvent::Progress { time_secs })
        }
        FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message) => {
            Some(EncoderEvent::Error(message))
        }
        FfmpegEvent::Log(_, message) => Some(EncoderEvent::Line(message)),
        FfmpegEvent::Error(message) => Some(EncoderEvent::Error(message)),
        _ => None,
    }
}
