use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use shopledger_audit::{AuditFilter, AuditRecord};
use shopledger_core::AggregateRoot;
use shopledger_customers::{Customer, CustomerId};
use shopledger_inventory::{Product, ProductId};

use super::r#trait::{CommitReceipt, LedgerBatch, LedgerStore, StoreError, StoredEvent, StreamKey};
use crate::query::{Page, Pagination};

#[derive(Debug, Default)]
struct State {
    streams: HashMap<StreamKey, Vec<StoredEvent>>,
    products: BTreeMap<ProductId, Product>,
    customers: BTreeMap<CustomerId, Customer>,
    audit: Vec<AuditRecord>,
}

impl State {
    fn revision(&self, key: &StreamKey) -> u64 {
        self.streams
            .get(key)
            .and_then(|s| s.last())
            .map(|e| e.sequence_number)
            .unwrap_or(0)
    }
}

/// In-memory ledger store.
///
/// One `RwLock` over the whole state: a commit validates the entire batch
/// and then applies it under a single write guard, so a batch is visible in
/// full or not at all. Intended for tests, dev and single-process use.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        // Commits validate before mutating, so a poisoned guard still holds
        // consistent state.
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate(state: &State, batch: &LedgerBatch) -> Result<HashMap<StreamKey, u64>, StoreError> {
        // Revision each touched stream reaches once the batch is applied.
        let mut revisions: HashMap<StreamKey, u64> = HashMap::new();
        for append in &batch.appends {
            if append.events.is_empty() {
                return Err(StoreError::Corrupt(format!("empty append to {}", append.key)));
            }
            if revisions.contains_key(&append.key) {
                return Err(StoreError::Corrupt(format!(
                    "stream {} appended twice in one batch",
                    append.key
                )));
            }
            let current = state.revision(&append.key);
            if !append.expected.matches(current) {
                return Err(StoreError::Concurrency(format!(
                    "{}: expected {:?}, found {current}",
                    append.key, append.expected
                )));
            }
            revisions.insert(append.key.clone(), current + append.events.len() as u64);
        }

        for product in &batch.products {
            let key = StreamKey::product(product.id_typed());
            let revision = revisions
                .get(&key)
                .copied()
                .unwrap_or_else(|| state.revision(&key));
            if product.version() != revision {
                return Err(StoreError::Corrupt(format!(
                    "product {} stored at version {} but its stream is at {revision}",
                    product.id_typed(),
                    product.version()
                )));
            }
        }
        for customer in &batch.customers {
            let key = StreamKey::customer(customer.id_typed());
            let revision = revisions
                .get(&key)
                .copied()
                .unwrap_or_else(|| state.revision(&key));
            if customer.version() != revision {
                return Err(StoreError::Corrupt(format!(
                    "customer {} stored at version {} but its stream is at {revision}",
                    customer.id_typed(),
                    customer.version()
                )));
            }
        }

        Ok(revisions)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read().products.get(&id).cloned())
    }

    fn load_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.read().customers.get(&id).cloned())
    }

    fn product_ids(&self) -> Result<Vec<ProductId>, StoreError> {
        Ok(self.read().products.keys().copied().collect())
    }

    fn customer_ids(&self) -> Result<Vec<CustomerId>, StoreError> {
        Ok(self.read().customers.keys().copied().collect())
    }

    fn load_stream(&self, key: &StreamKey) -> Result<Vec<StoredEvent>, StoreError> {
        Ok(self.read().streams.get(key).cloned().unwrap_or_default())
    }

    fn stream_exists(&self, key: &StreamKey) -> Result<bool, StoreError> {
        Ok(self.read().streams.get(key).is_some_and(|s| !s.is_empty()))
    }

    fn scan_audit(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<Page<AuditRecord>, StoreError> {
        let state = self.read();
        Ok(pagination.apply(state.audit.iter().filter(|r| filter.matches(r)).cloned()))
    }

    fn commit(&self, batch: LedgerBatch) -> Result<CommitReceipt, StoreError> {
        if batch.is_empty() {
            return Ok(CommitReceipt::default());
        }

        let mut state = self.write();
        Self::validate(&state, &batch)?;

        // Nothing below can fail.
        let recorded_at = Utc::now();
        let mut receipt = CommitReceipt::default();

        for append in batch.appends {
            let stream = state.streams.entry(append.key.clone()).or_default();
            let mut next = stream.last().map(|e| e.sequence_number).unwrap_or(0) + 1;
            for e in append.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: append.key.aggregate_id,
                    aggregate_type: append.key.aggregate_type.clone(),
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    recorded_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                receipt.events.push(stored);
            }
        }

        for product in batch.products {
            state.products.insert(product.id_typed(), product);
        }
        for customer in batch.customers {
            state.customers.insert(customer.id_typed(), customer);
        }

        let mut sequence = state.audit.last().map(|r| r.sequence).unwrap_or(0);
        for (id, record) in batch.audit {
            sequence += 1;
            let committed = record.commit(id, sequence);
            state.audit.push(committed.clone());
            receipt.audit.push(committed);
        }

        Ok(receipt)
    }
}

/// Out-of-band writes that bypass the ledgers, for simulating drift and
/// damaged history in tests.
#[cfg(any(test, feature = "test-util"))]
impl InMemoryLedgerStore {
    /// Overwrite a product's stored stock without a movement.
    pub fn tamper_product_stock(
        &self,
        id: ProductId,
        stock_on_hand: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.write();
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("no product {id}")))?;
        *product = with_field(product, "stock_on_hand", serde_json::json!(stock_on_hand))?;
        Ok(())
    }

    /// Overwrite a customer's stored debt without a movement.
    pub fn tamper_customer_debt(
        &self,
        id: CustomerId,
        outstanding_debt: rust_decimal::Decimal,
    ) -> Result<(), StoreError> {
        let mut state = self.write();
        let customer = state
            .customers
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("no customer {id}")))?;
        *customer = with_field(
            customer,
            "outstanding_debt",
            serde_json::json!(outstanding_debt.to_string()),
        )?;
        Ok(())
    }

    /// Remove a stream entirely, leaving whatever references it dangling.
    pub fn tamper_remove_stream(&self, key: &StreamKey) -> bool {
        self.write().streams.remove(key).is_some()
    }

    /// Number of streams of one type, for assertions.
    pub fn stream_count(&self, aggregate_type: &str) -> usize {
        self.read()
            .streams
            .keys()
            .filter(|k| k.aggregate_type == aggregate_type)
            .count()
    }
}

#[cfg(any(test, feature = "test-util"))]
fn with_field<T>(value: &T, field: &str, replacement: serde_json::Value) -> Result<T, StoreError>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let mut json =
        serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    json[field] = replacement;
    serde_json::from_value(json).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use shopledger_core::{Aggregate, ExpectedVersion, UserId};
    use shopledger_inventory::{ProductCommand, RegisterProduct};

    use super::*;
    use crate::ledger_store::{StreamAppend, UncommittedEvent};

    fn registered_product() -> (Product, UncommittedEvent) {
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        let events = product
            .execute(&ProductCommand::RegisterProduct(RegisterProduct {
                product_id,
                name: "Coil pack".to_string(),
                unit_price: dec!(4),
                cost_basis: dec!(2),
                low_stock_threshold: 1,
                actor: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        let uncommitted = UncommittedEvent::from_typed(&events[0]).unwrap();
        (product, uncommitted)
    }

    fn register_batch(product: &Product, event: UncommittedEvent) -> LedgerBatch {
        LedgerBatch {
            appends: vec![StreamAppend {
                key: StreamKey::product(product.id_typed()),
                expected: ExpectedVersion::NoStream,
                events: vec![event],
            }],
            products: vec![product.clone()],
            ..LedgerBatch::default()
        }
    }

    #[test]
    fn commit_assigns_sequence_numbers_and_stores_value() {
        let store = InMemoryLedgerStore::new();
        let (product, event) = registered_product();

        let receipt = store.commit(register_batch(&product, event)).unwrap();

        assert_eq!(receipt.events.len(), 1);
        assert_eq!(receipt.events[0].sequence_number, 1);
        assert_eq!(store.load_product(product.id_typed()).unwrap(), Some(product.clone()));
        assert_eq!(store.product_ids().unwrap(), vec![product.id_typed()]);
    }

    #[test]
    fn stale_expected_version_rejects_whole_batch() {
        let store = InMemoryLedgerStore::new();
        let (product, event) = registered_product();
        store.commit(register_batch(&product, event.clone())).unwrap();

        let (other, other_event) = registered_product();
        let mut batch = register_batch(&other, other_event);
        // Second append to an existing stream claiming it does not exist.
        batch.appends.push(StreamAppend {
            key: StreamKey::product(product.id_typed()),
            expected: ExpectedVersion::NoStream,
            events: vec![event],
        });

        let err = store.commit(batch).unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
        assert_eq!(store.load_product(other.id_typed()).unwrap(), None);
        assert!(!store.stream_exists(&StreamKey::product(other.id_typed())).unwrap());
    }

    #[test]
    fn stored_value_must_match_stream_revision() {
        let store = InMemoryLedgerStore::new();
        let (product, _) = registered_product();
        let batch = LedgerBatch {
            products: vec![product],
            ..LedgerBatch::default()
        };
        assert!(matches!(store.commit(batch), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn tamper_changes_value_but_not_stream() {
        let store = InMemoryLedgerStore::new();
        let (product, event) = registered_product();
        store.commit(register_batch(&product, event)).unwrap();

        store.tamper_product_stock(product.id_typed(), 50).unwrap();

        let loaded = store.load_product(product.id_typed()).unwrap().unwrap();
        assert_eq!(loaded.stock_on_hand(), 50);
        assert_eq!(loaded.version(), 1);
        assert_eq!(store.load_stream(&StreamKey::product(product.id_typed())).unwrap().len(), 1);
    }
}
