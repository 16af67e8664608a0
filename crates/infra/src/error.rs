//! Errors surfaced by ledger operations.

use rust_decimal::Decimal;
use thiserror::Error;

use shopledger_auth::AuthzError;
use shopledger_core::DomainError;
use shopledger_customers::CustomerId;
use shopledger_inventory::ProductId;

use crate::ledger_store::StoreError;
use crate::locks::LockError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failure of a ledger operation.
///
/// Every variant except `StorageFailure` is a deterministic rejection that
/// left all state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    #[error("debt for customer {customer_id} would go negative: balance {balance}, delta {delta}")]
    DebtWouldGoNegative {
        customer_id: CustomerId,
        balance: Decimal,
        delta: Decimal,
    },

    #[error("payment of {amount} exceeds outstanding debt {balance} for customer {customer_id}")]
    OverpaymentRejected {
        customer_id: CustomerId,
        balance: Decimal,
        amount: Decimal,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Nothing was committed, but the store itself misbehaved.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("{count} ledger entries drifted from their movement log")]
    DriftDetected { count: usize },
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Stable machine-readable code, used in logs and API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION",
            LedgerError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            LedgerError::DebtWouldGoNegative { .. } => "DEBT_WOULD_GO_NEGATIVE",
            LedgerError::OverpaymentRejected { .. } => "OVERPAYMENT_REJECTED",
            LedgerError::Forbidden(_) => "FORBIDDEN",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            LedgerError::StorageFailure(_) => "STORAGE_FAILURE",
            LedgerError::DriftDetected { .. } => "DRIFT_DETECTED",
        }
    }

    /// A caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict(_))
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::Validation(msg),
            DomainError::InvariantViolation(msg) => LedgerError::Validation(msg),
            DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::NotFound => LedgerError::NotFound("entity".to_string()),
            DomainError::Conflict(msg) => LedgerError::ConcurrencyConflict(msg),
            DomainError::InsufficientStock {
                product,
                available,
                requested,
            } => LedgerError::InsufficientStock {
                product_id: ProductId::new(product),
                available,
                requested,
            },
            DomainError::DebtWouldGoNegative {
                customer,
                balance,
                delta,
            } => LedgerError::DebtWouldGoNegative {
                customer_id: CustomerId::new(customer),
                balance,
                delta,
            },
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => LedgerError::ConcurrencyConflict(msg),
            other => {
                tracing::error!(
                    target: "shopledger::alert",
                    error = %other,
                    "ledger store failure, posting rolled back"
                );
                LedgerError::StorageFailure(other.to_string())
            }
        }
    }
}

impl From<LockError> for LedgerError {
    fn from(value: LockError) -> Self {
        LedgerError::ConcurrencyConflict(value.to_string())
    }
}

impl From<AuthzError> for LedgerError {
    fn from(value: AuthzError) -> Self {
        LedgerError::Forbidden(value.to_string())
    }
}
