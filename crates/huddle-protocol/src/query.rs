//! Query-string parameters.

use serde::Deserialize;
use std::num::NonZeroUsize;
use thiserror::Error;

/// `limit` was present but not a positive integer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("limit must be a positive integer, got {0:?}")]
pub struct LimitError(pub String);

/// Query parameters of `GET /messages`.
///
/// `limit` is kept as raw text so that malformed values can be reported as
/// a validation failure rather than a generic extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<String>,
}

impl MessagesQuery {
    /// The validated limit.
    ///
    /// # Errors
    ///
    /// Returns an error if `limit` is present but not a positive integer.
    pub fn limit(&self) -> Result<Option<NonZeroUsize>, LimitError> {
        parse_limit(self.limit.as_deref())
    }
}

/// Parse an optional `limit` value.
///
/// Absent means "no limit". Anything present must parse as an integer
/// greater than zero.
///
/// # Errors
///
/// Returns an error for non-numeric, zero or negative values.
pub fn parse_limit(raw: Option<&str>) -> Result<Option<NonZeroUsize>, LimitError> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<NonZeroUsize>()
            .map(Some)
            .map_err(|_| LimitError(value.to_string())),
    }
}
