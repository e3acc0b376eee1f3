//! Progress and status reporting for render jobs.
//!
//! The core never prints. It reports through a `RenderObserver` passed in
//! by the caller: integer percent progress, short status lines and exactly
//! one terminal result. The CLI draws a progress bar from these callbacks,
//! the notification layer forwards the result, and `LoggingObserver` mirrors
//! everything into the log.
//!
//! Callbacks arrive on the thread that runs the job, in stage order, with
//! percent values that never decrease.

pub mod ffmpeg_handler;

use crate::render::RenderResult;
use std::cell::{Cell, RefCell};

/// Receives the progress of a single render job.
pub trait RenderObserver {
    /// Overall progress in percent, 0..=100, never decreasing.
    fn on_progress(&self, percent: u8);

    /// A short human-readable status line.
    fn on_status(&self, message: &str);

    /// The terminal result. Called exactly once per job.
    fn on_finished(&self, result: &RenderResult);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RenderObserver for NullObserver {
    fn on_progress(&self, _percent: u8) {}
    fn on_status(&self, _message: &str) {}
    fn on_finished(&self, _result: &RenderResult) {}
}

/// Mirrors status lines and every tenth percent into the log.
#[derive(Debug, Default)]
pub struct LoggingObserver {
    last_logged: Cell<Option<u8>>,
}

impl LoggingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderObserver for LoggingObserver {
    fn on_progress(&self, percent: u8) {
        let bucket = percent / 10 * 10;
        if self.last_logged.get().is_none_or(|last| bucket > last) {
            self.last_logged.set(Some(bucket));
            log::info!("Render progress: {bucket}%");
        }
    }

    fn on_status(&self, message: &str) {
        log::info!("{message}");
    }

    fn on_finished(&self, result: &RenderResult) {
        match result {
            RenderResult::Completed(success) => log::info!(
                "Render finished: {} in {}",
                success.output_path.display(),
                crate::utils::format_duration(success.elapsed_ms as f64 / 1000.0)
            ),
            RenderResult::Failed(failure) => {
                log::error!("Render failed ({}): {}", failure.kind, failure.message);
                for line in &failure.tail {
                    log::error!(target: "ffmpeg", "{line}");
                }
            }
        }
    }
}

/// Fans callbacks out to several observers in order.
#[derive(Default)]
pub struct ObserverSet<'a> {
    observers: Vec<&'a dyn RenderObserver>,
}

impl<'a> ObserverSet<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, observer: &'a dyn RenderObserver) -> Self {
        self.observers.push(observer);
        self
    }
}

impl RenderObserver for ObserverSet<'_> {
    fn on_progress(&self, percent: u8) {
        for observer in &self.observers {
            observer.on_progress(percent);
        }
    }

    fn on_status(&self, message: &str) {
        for observer in &self.observers {
            observer.on_status(message);
        }
    }

    fn on_finished(&self, result: &RenderResult) {
        for observer in &self.observers {
            observer.on_finished(result);
        }
    }
}

/// Records every callback. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub progress: RefCell<Vec<u8>>,
    pub statuses: RefCell<Vec<String>>,
    pub results: RefCell<Vec<RenderResult>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn progress(&self) -> Vec<u8> {
        self.progress.borrow().clone()
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.borrow().clone()
    }

    #[must_use]
    pub fn results(&self) -> Vec<RenderResult> {
        self.results.borrow().clone()
    }
}

impl RenderObserver for RecordingObserver {
    fn on_progress(&self, percent: u8) {
        self.progress.borrow_mut().push(percent);
    }

    fn on_status(&self, message: &str) {
        self.statuses.borrow_mut().push(message.to_string());
    }

    fn on_finished(&self, result: &RenderResult) {
        self.results.borrow_mut().push(result.clone());
    }
}

/// Turns per-stage fractions into monotonic overall percentages.
///
/// Each stage owns a weight; completed stages form the prefix. A stage that
/// restarts (encoder fallback) may report smaller fractions again, which are
/// absorbed instead of being emitted.
pub struct ProgressAccumulator<'a> {
    observer: &'a dyn RenderObserver,
    prefix: f64,
    last_emitted: Option<u8>,
}

impl<'a> ProgressAccumulator<'a> {
    #[must_use]
    pub fn new(observer: &'a dyn RenderObserver) -> Self {
        Self {
            observer,
            prefix: 0.0,
            last_emitted: None,
        }
    }

    /// Reports `fraction` of a stage weighing `weight`.
    pub fn report(&mut self, weight: f64, fraction: f64) {
        let overall = self.prefix + weight * fraction.clamp(0.0, 1.0);
        self.emit(overall);
    }

    /// Marks a stage of `weight` as complete.
    pub fn complete_stage(&mut self, weight: f64) {
        self.prefix += weight;
        self.emit(self.prefix);
    }

    /// Emits 100 if it has not been emitted yet.
    pub fn finish(&mut self) {
        self.emit(1.0);
    }

    #[must_use]
    pub fn last_emitted(&self) -> Option<u8> {
        self.last_emitted
    }

    fn emit(&mut self, overall: f64) {
        // Epsilon absorbs weight sums such as 0.8 + 0.15 landing just below a whole percent.
        let percent = ((overall * 100.0 + 1e-6).floor()).clamp(0.0, 100.0) as u8;
        if self.last_emitted.is_none_or(|last| percent > last) {
            self.last_emitted = Some(percent);
            self.observer.on_progress(percent);
        }
    }
}
