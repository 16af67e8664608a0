//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered by `RUST_LOG`. Storage failures are logged
//! on [`ALERT_TARGET`]; route that target to whatever pages an operator.

use tracing_subscriber::EnvFilter;

/// Target the ledger logs storage failures on.
pub const ALERT_TARGET: &str = "shopledger::alert";

const DEFAULT_FILTER: &str = "info";

/// Initialize tracing/logging for the process from `RUST_LOG`, falling back
/// to `info`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// Like [`init`], with an explicit filter directive. An unparsable directive
/// falls back to `info`. Returns `false` if a subscriber was already set.
pub fn init_with_filter(directives: &str) -> bool {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter)
}

fn install(filter: EnvFilter) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_current_span(true)
        .try_init()
        .is_ok()
}
