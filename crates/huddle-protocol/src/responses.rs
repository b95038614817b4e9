//! Response bodies.

use crate::requests::WireKind;
use huddle_core::{Message, Participant};
use serde::{Deserialize, Serialize};

/// A message as clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub from: String,
    pub to: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: WireKind,
    /// Append time, `HH:MM:SS` in UTC.
    pub time: String,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            from: message.from.clone(),
            to: message.to.as_str().to_string(),
            text: message.text.clone(),
            kind: message.kind.into(),
            time: message.time.format("%H:%M:%S").to_string(),
        }
    }
}

/// A participant as clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub name: String,
    /// Last heartbeat, epoch milliseconds.
    #[serde(rename = "lastStatus")]
    pub last_status: i64,
}

impl From<&Participant> for ParticipantView {
    fn from(participant: &Participant) -> Self {
        Self {
            name: participant.name.clone(),
            last_status: participant.last_heartbeat.timestamp_millis(),
        }
    }
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error kind, e.g. `conflict`.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
}

impl ErrorBody {
    /// Create an error payload.
    #[must_use]
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Payload of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use huddle_core::{Draft, MessageKind, Recipient};

    #[test]
    fn test_message_view() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).unwrap();
        let message = Message::from_draft(
            Draft::new("dave", Recipient::participant("carol"), "psst", MessageKind::Direct),
            4,
            time,
        );

        let json = serde_json::to_value(MessageView::from(&message)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "from": "dave",
                "to": "carol",
                "text": "psst",
                "type": "private_message",
                "time": "07:05:03"
            })
        );
    }

    #[test]
    fn test_status_view_uses_marker() {
        let message = Message::from_draft(Draft::arrival("alice"), 1, Utc::now());
        let view = MessageView::from(&message);
        assert_eq!(view.to, "todos");
        assert_eq!(view.kind, WireKind::Status);
    }

    #[test]
    fn test_participant_view() {
        let time = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let participant = Participant {
            name: "bob".to_string(),
            last_heartbeat: time,
        };
        let json = serde_json::to_value(ParticipantView::from(&participant)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "bob", "lastStatus": 1_700_000_000_123_i64})
        );
    }
}
