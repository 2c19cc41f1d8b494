//! Events published to presentation collaborators (status bar, notifier).

use serde::{Deserialize, Serialize};

/// Title used on every user-facing notification.
pub const NOTIFICATION_TITLE: &str = "autoconvert";

/// Status transition of the converter.
///
/// Serialised as `{"state":"converting","filename":"..."}` or `{"state":"idle"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StatusEvent {
    Converting { filename: String },
    Idle,
}

/// Message meant for the user's notification centre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotification {
    pub title: String,
    pub body: String,
}

impl UserNotification {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: body.into(),
        }
    }

    pub fn converted(filename: &str) -> Self {
        Self::new(format!("Converted {}", filename))
    }

    pub fn failed(filename: &str) -> Self {
        Self::new(format!("Conversion failed for {}", filename))
    }

    pub fn transcoder_missing(tool: &str, env_var: &str) -> Self {
        Self::new(format!("{} not found. Install it or set {}", tool, env_var))
    }
}

/// Everything the core publishes on its broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ConverterEvent {
    Status(StatusEvent),
    Notification(UserNotification),
}

impl ConverterEvent {
    pub fn converting(filename: impl Into<String>) -> Self {
        ConverterEvent::Status(StatusEvent::Converting {
            filename: filename.into(),
        })
    }

    pub fn idle() -> Self {
        ConverterEvent::Status(StatusEvent::Idle)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ConverterEvent::Status(StatusEvent::Idle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(StatusEvent::Converting {
            filename: "a.mkv".to_string(),
        })
        .unwrap();
        assert_eq!(json["state"], "converting");
        assert_eq!(json["filename"], "a.mkv");

        let json = serde_json::to_value(StatusEvent::Idle).unwrap();
        assert_eq!(json, serde_json::json!({"state": "idle"}));
    }

    #[test]
    fn test_idle_without_filename_deserializes() {
        let event: StatusEvent = serde_json::from_str(r#"{"state":"idle"}"#).unwrap();
        assert_eq!(event, StatusEvent::Idle);
    }

    #[test]
    fn test_notification_bodies() {
        assert_eq!(UserNotification::converted("a.mkv").body, "Converted a.mkv");
        assert_eq!(
            UserNotification::failed("a.mkv").body,
            "Conversion failed for a.mkv"
        );
        assert_eq!(UserNotification::converted("a.mkv").title, NOTIFICATION_TITLE);
    }
}
