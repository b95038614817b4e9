//! The room's message log.
//!
//! The log is the only authority over message order. Appends are serialized
//! so that sequence ids and timestamps advance together.

use crate::clock::Clock;
use crate::delivery;
use crate::error::{ChatError, StoreError};
use crate::message::{Draft, Message};
use crate::store::MessageStore;
use chrono::{DateTime, Utc};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Outcome of [`MessageLog::append_many`].
///
/// Drafts are appended in order and the batch stops at the first failure,
/// so `stored` is always a prefix of the input.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Messages that made it into the log.
    pub stored: Vec<Message>,
    /// The failure that stopped the batch, if any.
    pub error: Option<StoreError>,
}

impl BatchOutcome {
    /// Number of stored messages.
    #[must_use]
    pub fn count(&self) -> usize {
        self.stored.len()
    }

    /// Whether every draft was stored.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Append-only, globally ordered message log.
pub struct MessageLog {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    /// Time of the latest append; held while appending.
    last_stamp: Mutex<DateTime<Utc>>,
}

impl MessageLog {
    /// Create a log over a store.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            last_stamp: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Append a message.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store rejects the write.
    pub async fn append(&self, draft: Draft) -> Result<Message, ChatError> {
        let mut last = self.last_stamp.lock().await;
        let message = self.append_locked(&mut last, draft).await?;
        debug!(seq = message.seq, kind = message.kind.as_str(), from = %message.from, "Appended");
        Ok(message)
    }

    /// Append several messages back to back.
    ///
    /// Partial success is possible and is reported through the outcome
    /// rather than as an error.
    pub async fn append_many(&self, drafts: Vec<Draft>) -> BatchOutcome {
        let mut last = self.last_stamp.lock().await;
        let mut outcome = BatchOutcome::default();

        for draft in drafts {
            match self.append_locked(&mut last, draft).await {
                Ok(message) => outcome.stored.push(message),
                Err(e) => {
                    warn!(stored = outcome.count(), error = %e, "Batch append stopped");
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        outcome
    }

    async fn append_locked(
        &self,
        last: &mut DateTime<Utc>,
        draft: Draft,
    ) -> Result<Message, StoreError> {
        // Never stamp earlier than the previous message, even if the clock steps back.
        let stamp = self.clock.now().max(*last);
        let message = self.store.append(draft, stamp).await?;
        *last = stamp;
        Ok(message)
    }

    /// Messages visible to `viewer`, in append order, optionally trimmed to
    /// the last `limit`.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store cannot be read.
    pub async fn query(
        &self,
        viewer: &str,
        limit: Option<NonZeroUsize>,
    ) -> Result<impl Iterator<Item = Message>, ChatError> {
        let messages = self.store.scan().await?;
        Ok(delivery::visible(messages, viewer, limit))
    }
}
