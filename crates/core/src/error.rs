//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::AggregateId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only (validation, ledger invariants,
/// conflicts). Storage and locking failures belong to the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input: bad quantities, amounts or names.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The aggregate has not been created yet.
    #[error("not found")]
    NotFound,

    /// Stale version or duplicate creation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stock movement would take a product below zero.
    #[error("insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: AggregateId,
        available: i64,
        requested: i64,
    },

    /// A debt movement would take a customer balance below zero.
    #[error("debt for customer {customer} would go negative: balance {balance}, delta {delta}")]
    DebtWouldGoNegative {
        customer: AggregateId,
        balance: Decimal,
        delta: Decimal,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
