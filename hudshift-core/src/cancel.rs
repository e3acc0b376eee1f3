//! Cooperative cancellation for a running render.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag.
///
/// Clones share the same flag, so a caller can hand one clone to a signal
/// handler or UI thread and pass another to the executor. Cancelling is
/// idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the render this token was passed to.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            log::info!("Cancellation requested");
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
