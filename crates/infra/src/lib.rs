//! Infrastructure layer: ledger store, locking, the two ledgers, the audit
//! log, and the coordinator and reconciliation engine built on them.

pub mod audit_log;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod ledger_store;
pub mod locks;
pub mod query;
pub mod rates;
pub mod reconciliation;
pub mod unit_of_work;

pub use audit_log::AuditLog;
pub use config::{ConfigError, LedgerConfig, StartupReconcile};
pub use coordinator::TransactionCoordinator;
pub use error::{LedgerError, LedgerResult};
pub use ledger::{CustomerLedger, ProductLedger};
pub use ledger_store::{InMemoryLedgerStore, LedgerStore, StoreError};
pub use locks::{LockManager, ResourceKey};
pub use query::{Page, Pagination};
pub use rates::ExchangeRateBook;
pub use reconciliation::{
    Drift, ReconcileMode, ReconcileScope, ReconciliationEngine, ReconciliationReport,
};
