//! Participant registry.
//!
//! The registry is a liveness table: name to last heartbeat. It never emits
//! messages; announcing arrivals and departures is the presence engine's job.

use crate::clock::Clock;
use crate::error::ChatError;
use crate::message::is_broadcast_marker;
use crate::store::ParticipantStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Maximum participant name length, in characters.
pub const MAX_NAME_LENGTH: usize = 64;

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique, case-sensitive name.
    pub name: String,
    /// Most recent liveness signal.
    pub last_heartbeat: DateTime<Utc>,
}

/// Result of [`Registry::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The participant existed and is gone now.
    Removed,
    /// Nothing to remove.
    NoOp,
}

/// Validate a participant name, returning it with surrounding whitespace
/// stripped.
///
/// # Errors
///
/// Returns an error message if the name is unusable.
pub fn validate_name(name: &str) -> Result<&str, &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Participant name cannot be empty");
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err("Participant name too long");
    }
    if name.chars().any(char::is_control) {
        return Err("Participant name contains invalid characters");
    }
    if is_broadcast_marker(name) {
        return Err("Participant name is reserved");
    }
    Ok(name)
}

/// Authoritative mapping of participant name to last heartbeat.
pub struct Registry {
    store: Arc<dyn ParticipantStore>,
    clock: Arc<dyn Clock>,
}

impl Registry {
    /// Create a registry over a store.
    #[must_use]
    pub fn new(store: Arc<dyn ParticipantStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Register a new participant with a fresh heartbeat.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a bad name, `Conflict` if the name is taken.
    pub async fn register(&self, name: &str) -> Result<Participant, ChatError> {
        let name = validate_name(name).map_err(|e| ChatError::InvalidInput(e.to_string()))?;
        let participant = Participant {
            name: name.to_string(),
            last_heartbeat: self.clock.now(),
        };

        if !self.store.insert_new(participant.clone()).await? {
            return Err(ChatError::Conflict(participant.name));
        }

        debug!(participant = %participant.name, "Registered");
        Ok(participant)
    }

    /// Refresh a participant's heartbeat.
    ///
    /// # Errors
    ///
    /// `NotFound` if the participant is not registered.
    pub async fn heartbeat(&self, name: &str) -> Result<(), ChatError> {
        if self.store.touch(name, self.clock.now()).await? {
            debug!(participant = %name, "Heartbeat");
            Ok(())
        } else {
            Err(ChatError::NotFound(name.to_string()))
        }
    }

    /// Look up a participant.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store fails.
    pub async fn get(&self, name: &str) -> Result<Option<Participant>, ChatError> {
        Ok(self.store.get(name).await?)
    }

    /// Snapshot of all participants, sorted by name.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store fails.
    pub async fn list(&self) -> Result<Vec<Participant>, ChatError> {
        let mut participants = self.store.list().await?;
        participants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(participants)
    }

    /// Participants whose last heartbeat is at or before `cutoff`.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store fails.
    pub async fn stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Participant>, ChatError> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|p| p.last_heartbeat <= cutoff)
            .collect())
    }

    /// Remove a participant. Missing names are a no-op.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store fails.
    pub async fn remove(&self, name: &str) -> Result<RemoveOutcome, ChatError> {
        if self.store.remove(name).await? {
            debug!(participant = %name, "Removed");
            Ok(RemoveOutcome::Removed)
        } else {
            Ok(RemoveOutcome::NoOp)
        }
    }
}
