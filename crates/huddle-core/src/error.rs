//! Error types shared across the core.

use thiserror::Error;

/// Failure of a backing store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by core operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed or missing input. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A participant with this name is already active.
    #[error("Participant already exists: {0}")]
    Conflict(String),

    /// The referenced participant is not active.
    #[error("Participant not found: {0}")]
    NotFound(String),

    /// Backing storage failed.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl ChatError {
    /// Short machine-readable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::InvalidInput(_) => "invalid_input",
            ChatError::Conflict(_) => "conflict",
            ChatError::NotFound(_) => "not_found",
            ChatError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
