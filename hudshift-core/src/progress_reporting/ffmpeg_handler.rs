//! Encoder event handling for a single stage.
//!
//! Converts encoder events into a completion fraction of the stage, routes
//! encoder output into the log and keeps the trailing lines for error
//! reports.

use crate::external::EncoderEvent;
use crate::utils::extract_time_token;
use std::collections::VecDeque;

/// Handler for the events of one encoder process.
pub struct StageProgressHandler {
    expected_duration: f64,
    tail: VecDeque<String>,
    tail_capacity: usize,
    last_time_secs: Option<f64>,
}

impl StageProgressHandler {
    #[must_use]
    pub fn new(expected_duration: f64, tail_capacity: usize) -> Self {
        Self {
            expected_duration,
            tail: VecDeque::with_capacity(tail_capacity.min(256)),
            tail_capacity,
            last_time_secs: None,
        }
    }

    /// Handles one event, returning the stage fraction when it carries a timestamp.
    pub fn handle_event(&mut self, event: EncoderEvent) -> Option<f64> {
        match event {
            EncoderEvent::Progress { time_secs } => self.fraction(time_secs),
            EncoderEvent::Line(line) => {
                log::debug!(target: "ffmpeg", "{line}");
                let fraction = extract_time_token(&line).and_then(|t| self.fraction(t));
                self.remember(line);
                fraction
            }
            EncoderEvent::Error(line) => {
                if is_non_critical(&line) {
                    log::debug!(target: "ffmpeg", "non-critical: {line}");
                } else {
                    log::warn!(target: "ffmpeg", "{line}");
                }
                self.remember(line);
                None
            }
        }
    }

    /// Trailing output lines, oldest first.
    #[must_use]
    pub fn tail(&self) -> Vec<String> {
        self.tail.iter().cloned().collect()
    }

    /// Last output timestamp seen, in seconds.
    #[must_use]
    pub fn last_time_secs(&self) -> Option<f64> {
        self.last_time_secs
    }

    fn fraction(&mut self, time_secs: f64) -> Option<f64> {
        self.last_time_secs = Some(time_secs);
        if self.expected_duration > 0.0 {
            Some((time_secs / self.expected_duration).clamp(0.0, 1.0))
        } else {
            None
        }
    }

    fn remember(&mut self, line: String) {
        if self.tail_capacity == 0 {
            return;
        }
        if self.tail.len() == self.tail_capacity {
            self.tail.pop_front();
        }
        self.tail.push_back(line);
    }
}

/// Encoder errors that do not affect the output.
fn is_non_critical(line: &str) -> bool {
    const NON_CRITICAL: [&str; 4] = [
        "Past duration",
        "deprecated pixel format",
        "Application provided invalid, non monotonically increasing dts",
        "Queue input is backward in time",
    ];
    NON_CRITICAL.iter().any(|pattern| line.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_and_time_tokens_become_fractions() {
        let mut handler = StageProgressHandler::new(30.0, 40);
        assert_eq!(handler.handle_event(EncoderEvent::Progress { time_secs: 15.0 }), Some(0.5));
        let line = "frame= 1200 fps=240 q=28.0 size=4096kB time=00:00:24.00 bitrate=1398.1kbits/s speed=4x";
        assert_eq!(handler.handle_event(EncoderEvent::Line(line.into())), Some(0.8));
        assert_eq!(handler.handle_event(EncoderEvent::Progress { time_secs: 45.0 }), Some(1.0));
        assert_eq!(handler.last_time_secs(), Some(45.0));
    }

    #[test]
    fn tail_keeps_only_the_last_lines() {
        let mut handler = StageProgressHandler::new(10.0, 3);
        for i in 0..5 {
            handler.handle_event(EncoderEvent::Line(format!("line {i}")));
        }
        handler.handle_event(EncoderEvent::Error("Conversion failed!".into()));
        assert_eq!(handler.tail(), vec!["line 3", "line 4", "Conversion failed!"]);
    }

    #[test]
    fn zero_duration_reports_no_fraction() {
        let mut handler = StageProgressHandler::new(0.0, 4);
        assert_eq!(handler.handle_event(EncoderEvent::Progress { time_secs: 1.0 }), None);
    }
}
