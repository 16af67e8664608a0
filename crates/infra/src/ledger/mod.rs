//! Product and customer ledgers.
//!
//! The only write path into either ledger is `apply_movement`, which stages a
//! movement on a [`UnitOfWork`](crate::unit_of_work::UnitOfWork) held by the
//! caller. Reads go straight to the committed store.

pub mod customer;
pub mod product;

pub use customer::CustomerLedger;
pub use product::ProductLedger;
