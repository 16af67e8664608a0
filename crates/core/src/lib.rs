//! `shopledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the ledgers
//! (no storage, no locking, no HTTP).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod ledger;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, UserId};
pub use ledger::{MovementId, TxKind, TxRef};
pub use money::{CurrencyCode, ensure_money_scale, ensure_non_negative, round_money};
