//! Presence engine for Huddle.
//!
//! The engine owns the registry's write path. It announces arrivals when a
//! participant registers and runs the periodic sweep that expires anyone
//! whose heartbeat has gone quiet, logging a departure for each.
//!
//! A participant is never removed unless its departure notice was stored
//! first. If the log refuses part of a batch, only the participants whose
//! notices made it in are removed; the rest are picked up again on the next
//! sweep.
//!
//! The engine also owns the rules a user message must satisfy; the request
//! layer only checks the shape of the body. Posting and expiry are
//! serialized against each other, so nothing is posted in a participant's
//! name once its departure is in the log.

use crate::clock::{Clock, SystemClock};
use crate::error::ChatError;
use crate::log::MessageLog;
use crate::message::{Draft, Message, MessageKind, Recipient};
use crate::registry::{Participant, Registry, RemoveOutcome};
use crate::store::{MemoryMessageStore, MemoryParticipantStore, MessageStore, ParticipantStore};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Presence engine configuration.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// How long a participant may stay silent before it is expired.
    pub stale_after: Duration,
    /// How often the sweep runs.
    pub sweep_interval: Duration,
    /// Maximum message length, in characters.
    pub max_text_length: usize,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(15),
            max_text_length: 2000,
        }
    }
}

/// A verified message author.
///
/// Only the engine hands these out, after checking the name belongs to an
/// active participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    name: String,
}

impl Sender {
    /// The sender's participant name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// What a single sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Participants found stale.
    pub expired: usize,
    /// Departure notices stored.
    pub announced: usize,
    /// Participants removed from the registry.
    pub removed: usize,
    /// Another sweep was already running.
    pub skipped: bool,
}

/// Orchestrates registration, heartbeats, posting and expiry.
pub struct PresenceEngine {
    registry: Registry,
    log: MessageLog,
    clock: Arc<dyn Clock>,
    config: PresenceConfig,
    sweep_guard: Mutex<()>,
    /// Shared by posts, exclusive while a sweep announces and removes.
    membership: RwLock<()>,
}

impl PresenceEngine {
    /// Create an engine over the given stores and clock.
    #[must_use]
    pub fn new(
        participants: Arc<dyn ParticipantStore>,
        messages: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
        config: PresenceConfig,
    ) -> Self {
        info!("Creating presence engine with config: {:?}", config);
        Self {
            registry: Registry::new(participants, clock.clone()),
            log: MessageLog::new(messages, clock.clone()),
            clock,
            config,
            sweep_guard: Mutex::new(()),
            membership: RwLock::new(()),
        }
    }

    /// Create an engine with in-memory stores and the system clock.
    #[must_use]
    pub fn in_memory(config: PresenceConfig) -> Self {
        Self::new(
            Arc::new(MemoryParticipantStore::new()),
            Arc::new(MemoryMessageStore::new()),
            Arc::new(SystemClock),
            config,
        )
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// Register a participant and announce its arrival.
    ///
    /// The arrival notice is in the log before this returns. If it cannot be
    /// stored, the registration is undone.
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `Conflict`, or `StoreUnavailable`.
    pub async fn register(&self, name: &str) -> Result<Participant, ChatError> {
        let participant = self.registry.register(name).await?;

        if let Err(e) = self.log.append(Draft::arrival(&participant.name)).await {
            warn!(participant = %participant.name, error = %e, "Arrival not logged, rolling back");
            if let Err(rollback) = self.registry.remove(&participant.name).await {
                warn!(participant = %participant.name, error = %rollback, "Rollback failed");
            }
            return Err(e);
        }

        info!(participant = %participant.name, "Participant joined");
        Ok(participant)
    }

    /// Refresh a participant's liveness.
    ///
    /// # Errors
    ///
    /// `NotFound` if the participant is not active.
    pub async fn heartbeat(&self, name: &str) -> Result<(), ChatError> {
        self.registry.heartbeat(name).await
    }

    /// Snapshot of active participants.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the registry cannot be read.
    pub async fn participants(&self) -> Result<Vec<Participant>, ChatError> {
        self.registry.list().await
    }

    /// Resolve a name into a [`Sender`].
    ///
    /// # Errors
    ///
    /// `InvalidInput` if no active participant has this name.
    pub async fn sender(&self, name: &str) -> Result<Sender, ChatError> {
        match self.registry.get(name).await? {
            Some(participant) => Ok(Sender {
                name: participant.name,
            }),
            None => Err(ChatError::InvalidInput(format!(
                "Sender is not an active participant: {name}"
            ))),
        }
    }

    /// Post a user message.
    ///
    /// The sender must still be active when the message is appended; a
    /// [`Sender`] whose participant has since been expired is refused.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the message is malformed or the sender is gone,
    /// `StoreUnavailable` if the log rejects it.
    pub async fn post(
        &self,
        sender: &Sender,
        to: Recipient,
        text: &str,
        kind: MessageKind,
    ) -> Result<Message, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::InvalidInput("Message text cannot be empty".into()));
        }
        if text.chars().count() > self.config.max_text_length {
            return Err(ChatError::InvalidInput("Message text too long".into()));
        }
        if matches!(&to, Recipient::Participant(name) if name.trim().is_empty()) {
            return Err(ChatError::InvalidInput("Recipient cannot be empty".into()));
        }
        match kind {
            MessageKind::Status => {
                return Err(ChatError::InvalidInput(
                    "Status messages are reserved for the room".into(),
                ));
            }
            MessageKind::Direct if to.is_everyone() => {
                return Err(ChatError::InvalidInput(
                    "Direct messages need a single recipient".into(),
                ));
            }
            _ => {}
        }

        let _gate = self.membership.read().await;
        if self.registry.get(sender.name()).await?.is_none() {
            return Err(ChatError::InvalidInput(format!(
                "Sender is no longer active: {}",
                sender.name()
            )));
        }

        let draft = Draft::new(sender.name(), to, text, kind);
        self.log.append(draft).await
    }

    /// Messages visible to `viewer`, oldest first, optionally only the last
    /// `limit`.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the log cannot be read.
    pub async fn messages(
        &self,
        viewer: &str,
        limit: Option<NonZeroUsize>,
    ) -> Result<Vec<Message>, ChatError> {
        Ok(self.log.query(viewer, limit).await?.collect())
    }

    /// Expire stale participants.
    ///
    /// Departure notices are stored first; only participants whose notice
    /// was stored are removed. Returns immediately with `skipped` set if
    /// another sweep is in progress.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the registry cannot be read.
    pub async fn sweep(&self) -> Result<SweepReport, ChatError> {
        let Ok(_guard) = self.sweep_guard.try_lock() else {
            debug!("Sweep already running, skipping");
            return Ok(SweepReport {
                skipped: true,
                ..SweepReport::default()
            });
        };

        let mut report = SweepReport::default();
        let stale_after = chrono::Duration::from_std(self.config.stale_after)
            .map_err(|_| ChatError::InvalidInput("Stale threshold out of range".into()))?;
        let Some(cutoff) = self.clock.now().checked_sub_signed(stale_after) else {
            return Ok(report);
        };

        let stale = self.registry.stale(cutoff).await?;
        report.expired = stale.len();
        if stale.is_empty() {
            trace!("Sweep found nothing stale");
            return Ok(report);
        }

        let _gate = self.membership.write().await;
        let drafts = stale.iter().map(|p| Draft::departure(&p.name)).collect();
        let outcome = self.log.append_many(drafts).await;
        report.announced = outcome.count();

        for notice in &outcome.stored {
            match self.registry.remove(&notice.from).await {
                Ok(RemoveOutcome::Removed) => {
                    report.removed += 1;
                    info!(participant = %notice.from, "Participant expired");
                }
                Ok(RemoveOutcome::NoOp) => {}
                Err(e) => {
                    warn!(participant = %notice.from, error = %e, "Failed to remove expired participant");
                }
            }
        }

        if let Some(e) = &outcome.error {
            warn!(
                pending = report.expired - report.announced,
                error = %e,
                "Some departures not logged, retrying next sweep"
            );
        }

        Ok(report)
    }

    /// Start the background sweeper.
    ///
    /// The first sweep runs one full interval after this call. The task stops
    /// when the returned handle is shut down or dropped.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        self.spawn_sweeper_with(|_| {})
    }

    /// Start the background sweeper, handing every completed sweep's report
    /// to `on_sweep`.
    #[must_use]
    pub fn spawn_sweeper_with<F>(self: &Arc<Self>, on_sweep: F) -> SweeperHandle
    where
        F: Fn(&SweepReport) + Send + 'static,
    {
        let engine = Arc::clone(self);
        let period = self.config.sweep_interval.max(Duration::from_millis(1));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(interval_ms = period.as_millis() as u64, "Sweeper started");
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => match engine.sweep().await {
                        Ok(report) if report.skipped => {}
                        Ok(report) => {
                            if report.expired > 0 {
                                info!(
                                    expired = report.expired,
                                    removed = report.removed,
                                    "Sweep complete"
                                );
                            }
                            on_sweep(&report);
                        }
                        Err(e) => warn!(error = %e, "Sweep failed"),
                    },
                }
            }
            info!("Sweeper stopped");
        });

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to the background sweeper task.
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Sweeper task ended abnormally");
        }
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
