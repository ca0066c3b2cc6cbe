//! The outward notification surface.
//!
//! The polling loop hands each decoded message to a [`Notifier`] as a
//! [`Notification`]. Rendering, sound playback, and icon caching are the
//! collaborator's business; sound and icon references are passed
//! through raw. The priority-to-urgency mapping is an explicit value
//! injected into each loop, not process-wide state.

use crate::relay::types::{Message, MessageBody};

/// Desktop urgency classes, named after the freedesktop notification
/// levels most presenters map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

/// Maps each relay priority class to a presentation urgency.
#[derive(Debug, Clone)]
pub struct UrgencyMap {
    pub lowest: Urgency,
    pub low: Urgency,
    pub normal: Urgency,
    pub high: Urgency,
    pub emergency: Urgency,
}

impl Default for UrgencyMap {
    fn default() -> Self {
        Self {
            lowest: Urgency::Low,
            low: Urgency::Low,
            normal: Urgency::Normal,
            high: Urgency::Normal,
            emergency: Urgency::Critical,
        }
    }
}

impl UrgencyMap {
    pub fn urgency_for(&self, priority: i64) -> Urgency {
        match priority {
            p if p <= -2 => self.lowest,
            -1 => self.low,
            0 => self.normal,
            1 => self.high,
            _ => self.emergency,
        }
    }
}

/// One decoded message, ready for presentation.
#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub urgency: Urgency,
    /// Unresolved sound reference for the caching collaborator.
    pub sound: Option<String>,
    /// Unresolved icon reference for the caching collaborator.
    pub icon: Option<String>,
    /// Unix timestamp from the relay.
    pub timestamp: i64,
}

impl Notification {
    /// Build the presentation view of a fetched message. Untitled
    /// messages fall back to the sending app's name; an undecryptable
    /// body is rendered as an explicit placeholder, never as the error
    /// text posing as message content.
    pub fn from_message(message: &Message, urgency: &UrgencyMap) -> Self {
        let title = if message.title.is_empty() {
            message.app.clone()
        } else {
            message.title.clone()
        };
        let body = match &message.body {
            MessageBody::Plain(text) | MessageBody::Decrypted(text) => text.clone(),
            MessageBody::Undecryptable(reason) => {
                format!("<message could not be decrypted: {reason}>")
            }
        };
        Self {
            title,
            body,
            urgency: urgency.urgency_for(message.priority),
            sound: message.sound.clone(),
            icon: message.icon.clone(),
            timestamp: message.date,
        }
    }
}

/// The presentation collaborator interface.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Notifier that writes each message to the log. The in-tree default;
/// desktop presenters implement [`Notifier`] outside this crate.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let when = chrono::DateTime::from_timestamp(notification.timestamp, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| notification.timestamp.to_string());
        log::info!(
            "[{when}] ({}) {}: {}",
            notification.urgency.as_str(),
            notification.title,
            notification.body
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with(body: MessageBody, priority: i64) -> Message {
        Message {
            id: 1,
            body,
            app: "backups".to_string(),
            icon: Some("app-icon-7".to_string()),
            date: 1_700_000_000,
            priority,
            sound: Some("siren".to_string()),
            acked: false,
            title: String::new(),
        }
    }

    #[test]
    fn test_default_urgency_mapping() {
        let map = UrgencyMap::default();
        assert_eq!(map.urgency_for(-2), Urgency::Low);
        assert_eq!(map.urgency_for(-1), Urgency::Low);
        assert_eq!(map.urgency_for(0), Urgency::Normal);
        assert_eq!(map.urgency_for(1), Urgency::Normal);
        assert_eq!(map.urgency_for(2), Urgency::Critical);
    }

    #[test]
    fn test_untitled_message_uses_app_name() {
        let message = message_with(MessageBody::Plain("done".to_string()), 0);
        let note = Notification::from_message(&message, &UrgencyMap::default());
        assert_eq!(note.title, "backups");
        assert_eq!(note.body, "done");
        assert_eq!(note.sound.as_deref(), Some("siren"));
        assert_eq!(note.icon.as_deref(), Some("app-icon-7"));
    }

    #[test]
    fn test_undecryptable_body_is_placeholder() {
        let message = message_with(
            MessageBody::Undecryptable("envelope authentication failed".to_string()),
            2,
        );
        let note = Notification::from_message(&message, &UrgencyMap::default());
        assert!(note.body.starts_with("<message could not be decrypted"));
        assert_eq!(note.urgency, Urgency::Critical);
    }
}
