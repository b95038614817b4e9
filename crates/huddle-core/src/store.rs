//! Storage seams for participants and messages.
//!
//! The registry and the log only talk to storage through these traits, so a
//! durable backend can be slotted in without touching the engine. The
//! in-memory implementations are what the server runs with by default.

use crate::error::StoreError;
use crate::message::{Draft, Message};
use crate::registry::Participant;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::RwLock;
use tracing::trace;

/// Key-value store of participants keyed by name.
#[async_trait]
pub trait ParticipantStore: Send + Sync + 'static {
    /// Insert a participant unless the name is taken.
    ///
    /// Returns `false` if an entry with the same name already exists. The
    /// check and the insert must be atomic with respect to each other.
    async fn insert_new(&self, participant: Participant) -> Result<bool, StoreError>;

    /// Set the heartbeat time of an existing participant.
    ///
    /// Returns `false` if the participant does not exist.
    async fn touch(&self, name: &str, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Look up a participant by name.
    async fn get(&self, name: &str) -> Result<Option<Participant>, StoreError>;

    /// Snapshot of all participants, in no particular order.
    async fn list(&self) -> Result<Vec<Participant>, StoreError>;

    /// Delete a participant. Returns `false` if it was already absent.
    async fn remove(&self, name: &str) -> Result<bool, StoreError>;
}

/// Append-only message store.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Append a draft stamped with `time`, assigning the next sequence id.
    async fn append(&self, draft: Draft, time: DateTime<Utc>) -> Result<Message, StoreError>;

    /// Every stored message, in append order.
    async fn scan(&self) -> Result<Vec<Message>, StoreError>;
}

/// In-memory participant store backed by a sharded map.
#[derive(Debug, Default)]
pub struct MemoryParticipantStore {
    participants: DashMap<String, Participant>,
}

impl MemoryParticipantStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParticipantStore for MemoryParticipantStore {
    async fn insert_new(&self, participant: Participant) -> Result<bool, StoreError> {
        match self.participants.entry(participant.name.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(participant);
                Ok(true)
            }
        }
    }

    async fn touch(&self, name: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        match self.participants.get_mut(name) {
            Some(mut entry) => {
                entry.last_heartbeat = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, name: &str) -> Result<Option<Participant>, StoreError> {
        Ok(self.participants.get(name).map(|e| e.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Participant>, StoreError> {
        Ok(self.participants.iter().map(|e| e.value().clone()).collect())
    }

    async fn remove(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.participants.remove(name).is_some())
    }
}

/// In-memory message store.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: RwLock<Vec<Message>>,
}

impl MemoryMessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("message store lock poisoned".to_string())
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, draft: Draft, time: DateTime<Utc>) -> Result<Message, StoreError> {
        let mut messages = self.messages.write().map_err(|_| poisoned())?;
        let seq = messages.len() as u64 + 1;
        let message = Message::from_draft(draft, seq, time);
        messages.push(message.clone());
        trace!(seq, "Message stored");
        Ok(message)
    }

    async fn scan(&self) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.read().map_err(|_| poisoned())?;
        Ok(messages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn participant(name: &str) -> Participant {
        Participant {
            name: name.to_string(),
            last_heartbeat: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_participant_insert_is_unique() {
        let store = MemoryParticipantStore::new();

        assert!(store.insert_new(participant("alice")).await.unwrap());
        assert!(!store.insert_new(participant("alice")).await.unwrap());
        // Names are case-sensitive
        assert!(store.insert_new(participant("Alice")).await.unwrap());

        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_participant_touch_and_remove() {
        let store = MemoryParticipantStore::new();
        store.insert_new(participant("bob")).await.unwrap();

        let later = Utc::now() + chrono::Duration::seconds(30);
        assert!(store.touch("bob", later).await.unwrap());
        assert!(!store.touch("nobody", later).await.unwrap());
        assert_eq!(
            store.get("bob").await.unwrap().unwrap().last_heartbeat,
            later
        );

        assert!(store.remove("bob").await.unwrap());
        assert!(!store.remove("bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_message_store_assigns_sequence() {
        let store = MemoryMessageStore::new();
        let now = Utc::now();

        let first = store.append(Draft::arrival("a"), now).await.unwrap();
        let second = store
            .append(
                Draft::new("a", "Todos".into(), "hi", MessageKind::Broadcast),
                now,
            )
            .await
            .unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);

        let all = store.scan().await.unwrap();
        assert_eq!(all, vec![first, second]);
    }
}
