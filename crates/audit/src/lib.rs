//! Audit trail records.
//!
//! Records are append-only: this crate has constructors and filters, nothing
//! that edits or removes a record once it has a sequence number.

pub mod filter;
pub mod record;

pub use filter::AuditFilter;
pub use record::{AuditAction, AuditRecord, AuditRecordId, EntityRef, EntityType, NewAuditRecord};
