//! Store error types.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Referenced resource or reservation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Interval overlaps an existing reservation, or the schedule lock
    /// could not be acquired in time.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A time that must lie on the slot grid does not.
    #[error("invalid alignment: {0}")]
    InvalidAlignment(String),

    /// Malformed input (non-positive duration, oversized query, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Internal error (persistence failure).
    #[error("internal: {0}")]
    Internal(String),
}

impl From<redb::Error> for StoreError {
    fn from(e: redb::Error) -> Self {
        StoreError::Internal(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
