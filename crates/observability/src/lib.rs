//! Process-wide tracing setup shared by the ledger binaries.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::{ALERT_TARGET, init, init_with_filter};
