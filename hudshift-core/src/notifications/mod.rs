//! Notifications about finished renders.
//!
//! Sent through ntfy when a topic is configured; see `NotifyingObserver` for
//! how they hook into a render job.
mod abstraction;
mod ntfy;

pub use self::abstraction::{
    Notification, NotificationSender, NotifyingObserver, NullNotificationSender,
};
pub use self::ntfy::NtfySender;
