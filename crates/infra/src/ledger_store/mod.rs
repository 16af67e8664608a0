//! Append-only ledger store boundary.
//!
//! One logical store holds the product and customer streams, their stored
//! values, the immutable transaction records and the audit log. Everything a
//! posting writes goes through a single [`LedgerStore::commit`].

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::{
    CUSTOMER_STREAM, CommitReceipt, LedgerBatch, LedgerStore, PRODUCT_STREAM, StoreError,
    StoredEvent, StreamAppend, StreamKey, UncommittedEvent,
};
