//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure here is deterministic and leaves the document it was raised
/// for untouched: operations either apply completely or not at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input (no customer, empty items, negative quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An operation was attempted in a lifecycle state that does not allow it.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A line item was already delivered or invoiced.
    ///
    /// Callers must re-fetch the document before retrying.
    #[error("fulfillment conflict: {0}")]
    FulfillmentConflict(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stale version on save (optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn fulfillment_conflict(msg: impl Into<String>) -> Self {
        Self::FulfillmentConflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// True for errors the caller should resolve by reloading current state.
    pub fn requires_refresh(&self) -> bool {
        matches!(self, Self::FulfillmentConflict(_) | Self::Conflict(_))
    }
}
