// ============================================================================
// hudshift-core/src/notifications/ntfy.rs
// ============================================================================
//
// NTFY IMPLEMENTATION: Push Notifications Through ntfy
//
// Sends render notifications to an ntfy topic given as a full URL such as
// `https://ntfy.sh/my-renders`. The blocking dispatcher is built per send.

use super::abstraction::{Notification, NotificationSender};
use crate::error::{CoreError, CoreResult};
use ::ntfy::DispatcherBuilder;
use ::ntfy::payload::{Payload, Priority as NtfyPriority};

/// Sends notifications to an ntfy server.
#[derive(Debug, Clone)]
pub struct NtfySender {
    base_url: String,
    topic: String,
}

impl NtfySender {
    /// Creates a sender for `topic_url`, which must be `https://host/topic`.
    pub fn new(topic_url: &str) -> CoreResult<Self> {
        let (base_url, topic) = split_topic_url(topic_url)?;
        Ok(Self { base_url, topic })
    }

    #[must_use]
    pub fn topic_url(&self) -> String {
        format!("{}/{}", self.base_url, self.topic)
    }
}

impl NotificationSender for NtfySender {
    fn send(&self, notification: &Notification) -> CoreResult<()> {
        let dispatcher = DispatcherBuilder::new(&self.base_url)
            .build_blocking()
            .map_err(|e| {
                CoreError::Notification(format!(
                    "Failed to build ntfy dispatcher for {}: {e}",
                    self.base_url
                ))
            })?;

        let payload = Payload::new(&self.topic)
            .message(notification.message())
            .title(notification.title())
            .priority(map_priority(notification.priority()))
            .tags(vec!["hudshift".to_string(), notification.tag().to_string()]);

        dispatcher.send(&payload).map_err(|e| {
            CoreError::Notification(format!(
                "Failed to send ntfy notification to {}: {e}",
                self.topic_url()
            ))
        })?;
        log::debug!("Sent '{}' notification to {}", notification.title(), self.topic_url());
        Ok(())
    }
}

fn split_topic_url(topic_url: &str) -> CoreResult<(String, String)> {
    let Some(after_scheme) = topic_url.strip_prefix("https://") else {
        return Err(CoreError::Notification(format!(
            "Invalid ntfy topic URL '{topic_url}': must start with https://"
        )));
    };
    let (host, topic) = after_scheme.split_once('/').unwrap_or((after_scheme, ""));
    if host.is_empty() {
        return Err(CoreError::Notification(format!(
            "URL '{topic_url}' must have a non-empty host"
        )));
    }
    let topic = topic.trim_end_matches('/');
    if topic.is_empty() {
        return Err(CoreError::Notification(format!(
            "URL '{topic_url}' is missing topic path"
        )));
    }
    Ok((format!("https://{host}"), topic.to_string()))
}

fn map_priority(priority: u8) -> NtfyPriority {
    match priority {
        1 => NtfyPriority::Min,
        2 => NtfyPriority::Low,
        4 => NtfyPriority::High,
        5 => NtfyPriority::Max,
        _ => NtfyPriority::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_url_is_split_into_host_and_topic() {
        let sender = NtfySender::new("https://ntfy.sh/renders").expect("valid");
        assert_eq!(sender.base_url, "https://ntfy.sh");
        assert_eq!(sender.topic, "renders");
        assert_eq!(sender.topic_url(), "https://ntfy.sh/renders");
    }

    #[test]
    fn invalid_urls_are_rejected() {
        for url in [
            "http://ntfy.sh/renders",
            "https:///renders",
            "https://ntfy.sh",
            "https://ntfy.sh/",
        ] {
            let err = NtfySender::new(url).expect_err(url);
            assert!(matches!(err, CoreError::Notification(_)), "{url}");
        }
    }
}
