//! HTTP API: server, routing, and request/response mapping.
//!
//! Transport glue only. Every rule lives in `shopledger-infra`; handlers
//! translate JSON to coordinator calls and `LedgerError` back to JSON.

pub mod app;
pub mod context;
pub mod middleware;
