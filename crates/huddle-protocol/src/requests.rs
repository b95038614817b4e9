//! Request bodies.
//!
//! These types only fix the shape of a body. Whether a message may be
//! posted (empty text, reserved types, a private message to everyone) is
//! decided by the core engine, so the rules live in one place.

use huddle_core::{MessageKind, Recipient};
use serde::{Deserialize, Serialize};

/// Message type as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireKind {
    /// Join/leave notice.
    Status,
    /// Public message.
    Message,
    /// Private message.
    PrivateMessage,
}

impl WireKind {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WireKind::Status => "status",
            WireKind::Message => "message",
            WireKind::PrivateMessage => "private_message",
        }
    }
}

impl From<MessageKind> for WireKind {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Status => WireKind::Status,
            MessageKind::Broadcast => WireKind::Message,
            MessageKind::Direct => WireKind::PrivateMessage,
        }
    }
}

impl From<WireKind> for MessageKind {
    fn from(kind: WireKind) -> Self {
        match kind {
            WireKind::Status => MessageKind::Status,
            WireKind::Message => MessageKind::Broadcast,
            WireKind::PrivateMessage => MessageKind::Direct,
        }
    }
}

/// Body of `POST /participants`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
}

/// Body of `POST /messages`.
///
/// The sender is not part of the body; the server resolves it from the
/// request before calling the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostMessageRequest {
    pub to: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: WireKind,
}

/// A message body converted into core types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub to: Recipient,
    pub text: String,
    pub kind: MessageKind,
}

impl PostMessageRequest {
    /// Convert the body into core types.
    ///
    /// Surrounding whitespace is dropped from the recipient so a padded
    /// broadcast marker still reaches everyone.
    #[must_use]
    pub fn into_post(self) -> Post {
        Post {
            to: Recipient::from(self.to.trim()),
            text: self.text,
            kind: self.kind.into(),
        }
    }
}
