//! # huddle-core
//!
//! Presence and delivery engine for the Huddle chat room.
//!
//! This crate provides the stateful parts of the room:
//!
//! - **Registry** - Participant liveness table keyed by name
//! - **Log** - Append-only, globally ordered message log
//! - **Presence** - Registration, heartbeats and the expiry sweep
//! - **Delivery** - Which messages a given viewer may read
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Requests   │────▶│  Presence   │────▶│  Registry   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                       │        ▲
//!                       ▼        │ sweep
//!                ┌─────────────┐ │  ┌─────────────┐
//!                │     Log     │ └──│   Sweeper   │
//!                └─────────────┘    └─────────────┘
//!                       │
//!                       ▼
//!                ┌─────────────┐
//!                │  Delivery   │
//!                └─────────────┘
//! ```

pub mod clock;
pub mod delivery;
pub mod error;
pub mod log;
pub mod message;
pub mod presence;
pub mod registry;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ChatError, StoreError};
pub use log::MessageLog;
pub use message::{
    is_broadcast_marker, Draft, Message, MessageKind, Recipient, SequenceId, BROADCAST_MARKER,
};
pub use presence::{PresenceConfig, PresenceEngine, Sender, SweepReport, SweeperHandle};
pub use registry::{Participant, Registry, RemoveOutcome};
pub use store::{MemoryMessageStore, MemoryParticipantStore, MessageStore, ParticipantStore};
