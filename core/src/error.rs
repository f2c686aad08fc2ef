use thiserror::Error;

use crate::health::HealthError;

/// Every failure the core can report to its caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input rejected at the caller boundary (non-positive weight, bad date, ...).
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Update or delete target does not exist.
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    ExternalService(#[from] HealthError),

    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
