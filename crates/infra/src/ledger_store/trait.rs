use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use shopledger_audit::{AuditFilter, AuditRecord, AuditRecordId, NewAuditRecord};
use shopledger_core::{AggregateId, ExpectedVersion, TxRef};
use shopledger_customers::{Customer, CustomerId};
use shopledger_events::EventEnvelope;
use shopledger_inventory::{Product, ProductId};
use std::sync::Arc;

use crate::query::{Page, Pagination};

/// Stream type of product ledgers.
pub const PRODUCT_STREAM: &str = "inventory.product";
/// Stream type of customer ledgers.
pub const CUSTOMER_STREAM: &str = "customers.customer";

/// Identity of one append-only stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    pub aggregate_type: String,
    pub aggregate_id: AggregateId,
}

impl StreamKey {
    pub fn new(aggregate_type: impl Into<String>, aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id,
        }
    }

    pub fn product(id: ProductId) -> Self {
        Self::new(PRODUCT_STREAM, id.aggregate_id())
    }

    pub fn customer(id: CustomerId) -> Self {
        Self::new(CUSTOMER_STREAM, id.aggregate_id())
    }

    /// Stream holding the record a movement references.
    pub fn for_tx(tx_ref: TxRef) -> Self {
        Self::new(tx_ref.kind.stream_type(), tx_ref.id)
    }
}

impl core::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.aggregate_id)
    }
}

/// An event ready to be appended (not yet assigned a sequence number).
///
/// Built from a typed domain event with [`UncommittedEvent::from_typed`], which
/// serializes the payload to JSON and captures the event metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl UncommittedEvent {
    pub fn from_typed<E>(event: &E) -> Result<Self, StoreError>
    where
        E: shopledger_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| StoreError::Serialization(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id: Uuid::now_v7(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// A committed event (assigned a sequence number within its stream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Position in the stream, starting at 1, no gaps.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Deserialize the payload into its typed event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<EventEnvelope<E>, StoreError> {
        let payload: E = serde_json::from_value(self.payload.clone()).map_err(|e| {
            StoreError::Serialization(format!(
                "cannot decode {} #{} ({}): {e}",
                self.aggregate_type, self.sequence_number, self.event_type
            ))
        })?;
        Ok(EventEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.recorded_at,
            payload,
        ))
    }
}

/// Events to append to one stream, guarded by a revision check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAppend {
    pub key: StreamKey,
    pub expected: ExpectedVersion,
    pub events: Vec<UncommittedEvent>,
}

/// Everything one posting writes. A store applies all of it or none of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerBatch {
    pub appends: Vec<StreamAppend>,
    /// Stored ledger values, each at the revision its stream reaches after
    /// `appends` are applied.
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
    pub audit: Vec<(AuditRecordId, NewAuditRecord)>,
}

impl LedgerBatch {
    pub fn is_empty(&self) -> bool {
        self.appends.is_empty()
            && self.products.is_empty()
            && self.customers.is_empty()
            && self.audit.is_empty()
    }
}

/// What a successful commit wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub events: Vec<StoredEvent>,
    pub audit: Vec<AuditRecord>,
}

/// Ledger store operation error.
///
/// Infrastructure errors only; domain rejections never reach the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("stream revision check failed: {0}")]
    Concurrency(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("stored data is inconsistent: {0}")]
    Corrupt(String),
}

/// The single logical store behind both ledgers, the transaction records and
/// the audit log.
///
/// ## Commit semantics
///
/// `commit()`:
/// - checks every `StreamAppend::expected` against the current stream revision
/// - checks every stored value's version against the revision its stream will reach
/// - assigns stream sequence numbers and global audit sequence numbers
/// - makes all of it visible at once, or returns an error having written nothing
///
/// Readers never observe half of a batch.
pub trait LedgerStore: Send + Sync {
    fn load_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    fn load_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    /// All product ids, ascending.
    fn product_ids(&self) -> Result<Vec<ProductId>, StoreError>;

    /// All customer ids, ascending.
    fn customer_ids(&self) -> Result<Vec<CustomerId>, StoreError>;

    /// Full stream in sequence order; empty if the stream does not exist.
    fn load_stream(&self, key: &StreamKey) -> Result<Vec<StoredEvent>, StoreError>;

    fn stream_exists(&self, key: &StreamKey) -> Result<bool, StoreError> {
        Ok(!self.load_stream(key)?.is_empty())
    }

    /// Sequential scan of the audit log, oldest first.
    fn scan_audit(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<Page<AuditRecord>, StoreError>;

    fn commit(&self, batch: LedgerBatch) -> Result<CommitReceipt, StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn load_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).load_product(id)
    }

    fn load_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        (**self).load_customer(id)
    }

    fn product_ids(&self) -> Result<Vec<ProductId>, StoreError> {
        (**self).product_ids()
    }

    fn customer_ids(&self) -> Result<Vec<CustomerId>, StoreError> {
        (**self).customer_ids()
    }

    fn load_stream(&self, key: &StreamKey) -> Result<Vec<StoredEvent>, StoreError> {
        (**self).load_stream(key)
    }

    fn stream_exists(&self, key: &StreamKey) -> Result<bool, StoreError> {
        (**self).stream_exists(key)
    }

    fn scan_audit(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<Page<AuditRecord>, StoreError> {
        (**self).scan_audit(filter, pagination)
    }

    fn commit(&self, batch: LedgerBatch) -> Result<CommitReceipt, StoreError> {
        (**self).commit(batch)
    }
}
