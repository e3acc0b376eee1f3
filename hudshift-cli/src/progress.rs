// ============================================================================
// hudshift-cli/src/progress.rs
// ============================================================================
//
// PROGRESS BAR: Terminal Observer for a Running Render
//
// Draws the overall render percentage with indicatif and shows the latest
// status line as the bar message. The bar is drawn on stderr and hides
// itself when stderr is not a terminal.
//
// KEY COMPONENTS:
// - ProgressBarObserver: RenderObserver backed by an indicatif bar

use console::style;
use hudshift_core::{RenderObserver, RenderResult, format_duration};
use indicatif::{ProgressBar, ProgressStyle};

use std::time::Duration;

const TEMPLATE: &str = "Rendering [{bar:40}] {percent:>3}% | {elapsed_precise} | {msg}";

/// Renders progress and status updates as a terminal progress bar.
pub struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Observer whose bar never draws, for tests and non-interactive runs.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Position of the bar, in percent.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for ProgressBarObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderObserver for ProgressBarObserver {
    fn on_progress(&self, percent: u8) {
        let position = u64::from(percent.min(100));
        if position >= self.bar.position() {
            self.bar.set_position(position);
        }
    }

    fn on_status(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn on_finished(&self, result: &RenderResult) {
        self.bar.finish_and_clear();
        let line = match result {
            RenderResult::Completed(success) => format!(
                "{} {} in {}",
                style("✓").green().bold(),
                success.output_path.display(),
                format_duration(success.elapsed_ms as f64 / 1000.0)
            ),
            RenderResult::Failed(failure) if result.is_cancelled() => format!(
                "{} Render cancelled after {}",
                style("✗").yellow().bold(),
                format_duration(failure.elapsed_ms as f64 / 1000.0)
            ),
            RenderResult::Failed(failure) => format!(
                "{} {}",
                style("✗").red().bold(),
                style(&failure.message).red()
            ),
        };
        eprintln!("{line}");
    }
}
