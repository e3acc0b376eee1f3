// ============================================================================
// hudshift-core/src/notifications/abstraction.rs
// ============================================================================
//
// NOTIFICATION ABSTRACTION: Render Outcome Notifications
//
// Notifications describe how a render ended. A sender delivers them to some
// backend; `NotifyingObserver` plugs a sender into the observer callbacks so
// the terminal result of a job is forwarded without the executor knowing
// about notifications at all.
//
// KEY COMPONENTS:
// - Notification: Completed, failed and cancelled renders
// - NotificationSender: Trait implemented by delivery backends
// - NullNotificationSender: No-op sender
// - NotifyingObserver: RenderObserver forwarding `on_finished` to a sender

use crate::error::CoreResult;
use crate::progress_reporting::RenderObserver;
use crate::render::RenderResult;
use crate::utils::{file_stem_or_default, format_duration};
use std::path::{Path, PathBuf};

// ============================================================================
// NOTIFICATION TYPES
// ============================================================================

/// Something worth telling the user about a finished render.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    RenderComplete {
        input_path: PathBuf,
        output_path: PathBuf,
        elapsed_ms: u64,
    },
    RenderFailed {
        input_path: PathBuf,
        message: String,
    },
    RenderCancelled {
        input_path: PathBuf,
    },
}

impl Notification {
    /// Builds the notification for a terminal render result.
    #[must_use]
    pub fn from_result(input_path: &Path, result: &RenderResult) -> Self {
        let input_path = input_path.to_path_buf();
        match result {
            RenderResult::Completed(success) => Notification::RenderComplete {
                input_path,
                output_path: success.output_path.clone(),
                elapsed_ms: success.elapsed_ms,
            },
            RenderResult::Failed(_) if result.is_cancelled() => {
                Notification::RenderCancelled { input_path }
            }
            RenderResult::Failed(failure) => Notification::RenderFailed {
                input_path,
                message: failure.message.clone(),
            },
        }
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Notification::RenderComplete { .. } => "Render Complete",
            Notification::RenderFailed { .. } => "Render Failed",
            Notification::RenderCancelled { .. } => "Render Cancelled",
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Notification::RenderComplete {
                input_path,
                output_path,
                elapsed_ms,
            } => format!(
                "Rendered {} to {} in {}",
                file_stem_or_default(input_path),
                output_path.display(),
                format_duration(*elapsed_ms as f64 / 1000.0)
            ),
            Notification::RenderFailed {
                input_path,
                message,
            } => format!("Render of {} failed: {message}", file_stem_or_default(input_path)),
            Notification::RenderCancelled { input_path } => {
                format!("Render of {} was cancelled", file_stem_or_default(input_path))
            }
        }
    }

    /// Priority from 1 (lowest) to 5 (highest).
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Notification::RenderComplete { .. } => 3,
            Notification::RenderCancelled { .. } => 3,
            Notification::RenderFailed { .. } => 5,
        }
    }

    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Notification::RenderComplete { .. } => "complete",
            Notification::RenderFailed { .. } => "error",
            Notification::RenderCancelled { .. } => "cancelled",
        }
    }
}

// ============================================================================
// NOTIFICATION SENDER
// ============================================================================

/// Delivers notifications to a backend.
pub trait NotificationSender {
    fn send(&self, notification: &Notification) -> CoreResult<()>;
}

/// Sender that drops every notification.
#[derive(Debug, Clone, Default)]
pub struct NullNotificationSender;

impl NotificationSender for NullNotificationSender {
    fn send(&self, _notification: &Notification) -> CoreResult<()> {
        Ok(())
    }
}

// ============================================================================
// OBSERVER BRIDGE
// ============================================================================

/// Forwards the terminal result of a render to a `NotificationSender`.
///
/// Delivery errors are logged and otherwise ignored.
pub struct NotifyingObserver<N: NotificationSender> {
    sender: N,
    input_path: PathBuf,
}

impl<N: NotificationSender> NotifyingObserver<N> {
    pub fn new(sender: N, input_path: impl Into<PathBuf>) -> Self {
        Self {
            sender,
            input_path: input_path.into(),
        }
    }
}

impl<N: NotificationSender> RenderObserver for NotifyingObserver<N> {
    fn on_progress(&self, _percent: u8) {}

    fn on_status(&self, _message: &str) {}

    fn on_finished(&self, result: &RenderResult) {
        let notification = Notification::from_result(&self.input_path, result);
        if let Err(e) = self.sender.send(&notification) {
            log::warn!("Failed to send notification: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::render::{RenderSuccess, StageKind};
    use std::cell::RefCell;

    #[derive(Default)]
    struct Captured {
        sent: RefCell<Vec<Notification>>,
        fail: bool,
    }

    impl NotificationSender for &Captured {
        fn send(&self, notification: &Notification) -> CoreResult<()> {
            self.sent.borrow_mut().push(notification.clone());
            if self.fail {
                return Err(CoreError::Notification("offline".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn completed_render_is_forwarded() {
        let captured = Captured::default();
        let observer = NotifyingObserver::new(&captured, "/clips/raid.mp4");
        observer.on_finished(&RenderResult::Completed(RenderSuccess {
            output_path: PathBuf::from("/out/raid_short.mp4"),
            elapsed_ms: 65_000,
        }));

        let sent = captured.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title(), "Render Complete");
        assert!(sent[0].message().contains("raid"));
        assert!(sent[0].message().contains("/out/raid_short.mp4"));
    }

    #[test]
    fn cancellation_gets_its_own_notification() {
        let result = RenderResult::failed(&CoreError::Cancelled { stage: StageKind::Intro }, 10);
        let notification = Notification::from_result(Path::new("/clips/raid.mp4"), &result);
        assert_eq!(notification.tag(), "cancelled");
        assert_eq!(notification.priority(), 3);
    }

    #[test]
    fn delivery_errors_do_not_panic() {
        let captured = Captured {
            fail: true,
            ..Captured::default()
        };
        let observer = NotifyingObserver::new(&captured, "/clips/raid.mp4");
        let result = RenderResult::failed(&CoreError::EmptyDuration(0.0), 1);
        observer.on_finished(&result);
        assert_eq!(captured.sent.borrow()[0].priority(), 5);
    }
}
