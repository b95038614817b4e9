//! # huddle-protocol
//!
//! The JSON contract between Huddle clients and the server.
//!
//! Request bodies are deserialized into the types in [`requests`] and
//! converted into the inputs the core accepts. The core decides whether a
//! message may be posted.
//! Responses are rendered from core types through the views in
//! [`responses`].
//!
//! ## Example
//!
//! ```rust
//! use huddle_protocol::{parse_limit, PostMessageRequest};
//!
//! let body = r#"{"to": "todos", "text": "oi", "type": "message"}"#;
//! let request: PostMessageRequest = serde_json::from_str(body).unwrap();
//! let post = request.into_post();
//! assert!(post.to.is_everyone());
//!
//! assert!(parse_limit(Some("0")).is_err());
//! assert_eq!(parse_limit(Some("3")).unwrap().map(|n| n.get()), Some(3));
//! ```

pub mod query;
pub mod requests;
pub mod responses;

pub use query::{parse_limit, LimitError, MessagesQuery};
pub use requests::{Post, PostMessageRequest, RegisterRequest, WireKind};
pub use responses::{ErrorBody, HealthBody, MessageView, ParticipantView};

/// Header carrying the caller's participant name.
pub const USER_HEADER: &str = "User";
