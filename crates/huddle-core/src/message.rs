//! Message types for the room log.
//!
//! A [`Draft`] is what callers hand to the log; a [`Message`] is what the
//! log hands back once it has assigned a sequence number and a timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a message in the log. Starts at 1.
pub type SequenceId = u64;

/// Recipient value meaning "everyone in the room".
///
/// Matched without regard to ASCII case.
pub const BROADCAST_MARKER: &str = "todos";

/// Whether `value` is the broadcast marker.
#[must_use]
pub fn is_broadcast_marker(value: &str) -> bool {
    value.eq_ignore_ascii_case(BROADCAST_MARKER)
}

/// Text of the notice appended when a participant joins.
pub const ARRIVAL_TEXT: &str = "entra na sala...";

/// Text of the notice appended when a participant is expired.
pub const DEPARTURE_TEXT: &str = "sai da sala...";

/// Who a message is addressed to.
///
/// On the wire this is a plain string; [`BROADCAST_MARKER`], in any case,
/// maps to [`Recipient::Everyone`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Recipient {
    /// Every viewer.
    Everyone,
    /// A single participant, by name.
    Participant(String),
}

impl Recipient {
    /// Address a single participant.
    #[must_use]
    pub fn participant(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    /// Whether this is the broadcast marker.
    #[must_use]
    pub fn is_everyone(&self) -> bool {
        matches!(self, Recipient::Everyone)
    }

    /// Whether this recipient is the named viewer.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        matches!(self, Recipient::Participant(p) if p == name)
    }

    /// String form as used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Recipient::Everyone => BROADCAST_MARKER,
            Recipient::Participant(name) => name,
        }
    }
}

impl From<String> for Recipient {
    fn from(value: String) -> Self {
        if is_broadcast_marker(&value) {
            Recipient::Everyone
        } else {
            Recipient::Participant(value)
        }
    }
}

impl From<&str> for Recipient {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Recipient> for String {
    fn from(value: Recipient) -> Self {
        match value {
            Recipient::Everyone => BROADCAST_MARKER.to_string(),
            Recipient::Participant(name) => name,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of message this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// System-generated join or leave notice.
    Status,
    /// Public message.
    Broadcast,
    /// Private message.
    Direct,
}

impl MessageKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Status => "status",
            MessageKind::Broadcast => "broadcast",
            MessageKind::Direct => "direct",
        }
    }
}

/// A message that has not been appended yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub from: String,
    pub to: Recipient,
    pub text: String,
    pub kind: MessageKind,
}

impl Draft {
    /// Create a draft.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: Recipient,
        text: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            from: from.into(),
            to,
            text: text.into(),
            kind,
        }
    }

    /// Join notice for `name`.
    #[must_use]
    pub fn arrival(name: impl Into<String>) -> Self {
        Self::new(name, Recipient::Everyone, ARRIVAL_TEXT, MessageKind::Status)
    }

    /// Leave notice for `name`.
    #[must_use]
    pub fn departure(name: impl Into<String>) -> Self {
        Self::new(name, Recipient::Everyone, DEPARTURE_TEXT, MessageKind::Status)
    }
}

/// An appended, immutable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Log position.
    pub seq: SequenceId,
    /// Sender name.
    pub from: String,
    /// Recipient.
    pub to: Recipient,
    /// Body.
    pub text: String,
    /// Kind of message.
    pub kind: MessageKind,
    /// When the log accepted the message.
    pub time: DateTime<Utc>,
}

impl Message {
    /// Seal a draft with its log position and timestamp.
    #[must_use]
    pub fn from_draft(draft: Draft, seq: SequenceId, time: DateTime<Utc>) -> Self {
        Self {
            seq,
            from: draft.from,
            to: draft.to,
            text: draft.text,
            kind: draft.kind,
            time,
        }
    }
}
