//! Seam to an external health-data provider (step counts).
//!
//! The core never talks to a platform SDK directly; callers hand in an
//! implementation of [`HealthDataSource`].

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthError {
    #[error("Health data provider is not available on this device")]
    Unavailable,

    #[error("Permission to read step data has not been granted")]
    PermissionDenied,

    #[error("Health data provider failed: {0}")]
    Other(String),
}

pub trait HealthDataSource: Send + Sync {
    fn is_available(&self) -> bool;

    fn has_permissions(&self) -> bool;

    /// Steps counted since local midnight.
    fn today_steps(&self) -> Result<u64, HealthError>;

    fn steps_for_range(&self, start: NaiveDateTime, end: NaiveDateTime)
    -> Result<u64, HealthError>;
}

fn ensure_ready(source: &dyn HealthDataSource) -> Result<(), HealthError> {
    if !source.is_available() {
        return Err(HealthError::Unavailable);
    }
    if !source.has_permissions() {
        return Err(HealthError::PermissionDenied);
    }
    Ok(())
}

/// Today's steps, after checking the provider is installed and authorized.
pub fn read_today_steps(source: &dyn HealthDataSource) -> Result<u64, HealthError> {
    ensure_ready(source)?;
    source.today_steps()
}

pub fn read_steps_for_range(
    source: &dyn HealthDataSource,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<u64, HealthError> {
    ensure_ready(source)?;
    if end < start {
        return Err(HealthError::Other(format!(
            "range end {end} is before start {start}"
        )));
    }
    source.steps_for_range(start, end)
}
