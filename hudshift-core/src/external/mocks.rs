// hudshift-core/src/external/mocks.rs

// --- Test Doubles for External Tools ---

//! Scriptable stand-ins for the encoder, the prober and file metadata.
//!
//! `MockEncoderSpawner` matches each spawned argv against registered
//! expectations (first expectation whose pattern is a substring of any
//! argument wins, and is consumed), records every call, and can create the
//! output file named by the last argument so later stages find it.
//!
//! A script with `stall` set goes silent after its events, ticking the
//! handler once per poll interval until the handler fails or the stall ends.

use super::{
    EncoderEvent, EncoderProcess, EncoderSpawner, FileMetadataProvider, MediaProber, ProbedMedia,
    ProcessExit,
};
use crate::cancel::CancelToken;
use crate::error::{CoreError, CoreResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

/// Mock implementation of `EncoderProcess`.
#[derive(Clone)]
pub struct MockEncoderProcess {
    events: Vec<EncoderEvent>,
    exit_code: Option<i32>,
    cancel_after: Option<(usize, CancelToken)>,
    stall: Option<Duration>,
    terminations: Rc<RefCell<usize>>,
}

impl EncoderProcess for MockEncoderProcess {
    fn handle_events<F>(&mut self, poll_interval: Duration, mut handler: F) -> CoreResult<()>
    where
        F: FnMut(Option<EncoderEvent>) -> CoreResult<()>,
    {
        for (index, event) in self.events.iter().cloned().enumerate() {
            if let Some((after, token)) = &self.cancel_after {
                if index == *after {
                    token.cancel();
                }
            }
            handler(Some(event))?;
        }
        if let Some(stall) = self.stall {
            let silent_since = Instant::now();
            while silent_since.elapsed() < stall {
                thread::sleep(poll_interval.min(stall));
                handler(None)?;
            }
        }
        Ok(())
    }

    fn wait(&mut self) -> CoreResult<ProcessExit> {
        Ok(ProcessExit {
            code: self.exit_code,
        })
    }

    fn terminate(&mut self, _grace: Duration) -> CoreResult<()> {
        *self.terminations.borrow_mut() += 1;
        self.exit_code = None;
        Ok(())
    }
}

/// An expected encoder call and its scripted behavior.
pub struct MockExpectation {
    pub arg_pattern: String,
    pub result: CoreResult<MockProcessScript>,
    pub create_dummy_output: bool,
}

/// Behavior of a mocked process.
#[derive(Clone, Default)]
pub struct MockProcessScript {
    pub events: Vec<EncoderEvent>,
    pub exit_code: Option<i32>,
    /// Cancels the token just before the event at this index is delivered.
    pub cancel_after: Option<(usize, CancelToken)>,
    /// Stays silent this long after the last event before exiting.
    pub stall: Option<Duration>,
}

impl MockProcessScript {
    #[must_use]
    pub fn success(events: Vec<EncoderEvent>) -> Self {
        Self {
            events,
            exit_code: Some(0),
            cancel_after: None,
            stall: None,
        }
    }

    /// A process that prints nothing for `duration`, then exits 0.
    #[must_use]
    pub fn stalled(duration: Duration) -> Self {
        Self {
            stall: Some(duration),
            ..Self::success(Vec::new())
        }
    }

    #[must_use]
    pub fn failure(events: Vec<EncoderEvent>, exit_code: i32) -> Self {
        Self {
            events,
            exit_code: Some(exit_code),
            cancel_after: None,
            stall: None,
        }
    }
}

/// Progress events at the given output times.
#[must_use]
pub fn progress_events(times: &[f64]) -> Vec<EncoderEvent> {
    times
        .iter()
        .map(|&time_secs| EncoderEvent::Progress { time_secs })
        .collect()
}

/// Mock implementation of `EncoderSpawner` supporting multiple expectations.
#[derive(Clone, Default)]
pub struct MockEncoderSpawner {
    expectations: Rc<RefCell<Vec<MockExpectation>>>,
    received_calls: Rc<RefCell<Vec<Vec<String>>>>,
    terminations: Rc<RefCell<usize>>,
}

impl MockEncoderSpawner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_expectation(
        &self,
        arg_pattern: &str,
        result: CoreResult<MockProcessScript>,
        create_dummy_output: bool,
    ) {
        self.expectations.borrow_mut().push(MockExpectation {
            arg_pattern: arg_pattern.to_string(),
            result,
            create_dummy_output,
        });
    }

    /// A process that emits `events`, exits 0 and leaves an output file behind.
    pub fn add_success_expectation(&self, arg_pattern: &str, events: Vec<EncoderEvent>) {
        self.add_expectation(arg_pattern, Ok(MockProcessScript::success(events)), true);
    }

    /// A process that emits `events` and exits with `exit_code`.
    pub fn add_exit_error_expectation(
        &self,
        arg_pattern: &str,
        events: Vec<EncoderEvent>,
        exit_code: i32,
    ) {
        self.add_expectation(
            arg_pattern,
            Ok(MockProcessScript::failure(events, exit_code)),
            false,
        );
    }

    pub fn add_spawn_error_expectation(&self, arg_pattern: &str, error: CoreError) {
        self.add_expectation(arg_pattern, Err(error), false);
    }

    #[must_use]
    pub fn get_received_calls(&self) -> Vec<Vec<String>> {
        self.received_calls.borrow().clone()
    }

    /// Number of times a spawned process was asked to terminate.
    #[must_use]
    pub fn terminations(&self) -> usize {
        *self.terminations.borrow()
    }

    /// Expectations that were never matched.
    #[must_use]
    pub fn pending_patterns(&self) -> Vec<String> {
        self.expectations
            .borrow()
            .iter()
            .map(|e| e.arg_pattern.clone())
            .collect()
    }
}

impl EncoderSpawner for MockEncoderSpawner {
    type Process = MockEncoderProcess;

    fn spawn(&self, args: &[String]) -> CoreResult<Self::Process> {
        self.received_calls.borrow_mut().push(args.to_vec());

        let found = {
            let mut expectations = self.expectations.borrow_mut();
            expectations
                .iter()
                .position(|exp| args.iter().any(|arg| arg.contains(&exp.arg_pattern)))
                .map(|index| expectations.remove(index))
        };
        let Some(expectation) = found else {
            log::error!("MockEncoderSpawner: no expectation for args {args:?}");
            return Err(CoreError::PlanInvariantBroken(format!(
                "no mock expectation matches {args:?}"
            )));
        };
        log::debug!(
            "MockEncoderSpawner: matched expectation '{}'",
            expectation.arg_pattern
        );

        let script = expectation.result?;
        if expectation.create_dummy_output {
            if let Some(output) = args.last() {
                let output = PathBuf::from(output);
                if let Some(parent) = output.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&output, b"mock encoder output")?;
            }
        }
        Ok(MockEncoderProcess {
            events: script.events,
            exit_code: script.exit_code,
            cancel_after: script.cancel_after,
            stall: script.stall,
            terminations: Rc::clone(&self.terminations),
        })
    }
}

/// Mock implementation of `MediaProber`.
#[derive(Clone, Default)]
pub struct MockMediaProber {
    results: HashMap<PathBuf, ProbedMedia>,
    calls: Rc<RefCell<Vec<PathBuf>>>,
}

impl MockMediaProber {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, path: impl Into<PathBuf>, media: ProbedMedia) -> Self {
        self.results.insert(path.into(), media);
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.borrow().clone()
    }
}

impl MediaProber for MockMediaProber {
    fn probe(&self, input_path: &Path) -> CoreResult<ProbedMedia> {
        self.calls.borrow_mut().push(input_path.to_path_buf());
        self.results
            .get(input_path)
            .cloned()
            .ok_or_else(|| CoreError::ProbeFailed {
                path: input_path.to_path_buf(),
                reason: "no mock probe result".to_string(),
            })
    }
}

/// Mock implementation of `FileMetadataProvider` returning fixed sizes.
#[derive(Clone, Default)]
pub struct MockMetadataProvider {
    sizes: HashMap<PathBuf, u64>,
}

impl MockMetadataProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, path: impl Into<PathBuf>, size: u64) -> Self {
        self.sizes.insert(path.into(), size);
        self
    }
}

impl FileMetadataProvider for MockMetadataProvider {
    fn get_size(&self, path: &Path) -> CoreResult<u64> {
        self.sizes.get(path).copied().ok_or_else(|| {
            CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no mock size for {}", path.display()),
            ))
        })
    }
}
