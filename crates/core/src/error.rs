//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Errors raised while constructing value types.
///
/// Only deterministic input problems live here. Ingestion, fitting and storage
/// failures have their own enums in the crates that own those stages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Out-of-range or unknown setting (frequency, horizon, month number).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Month, week or period label that cannot be placed on the axis.
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// A series or point broke an ordering or consistency rule.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_period(msg: impl Into<String>) -> Self {
        Self::InvalidPeriod(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
