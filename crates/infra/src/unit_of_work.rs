//! Staging area for one posting.
//!
//! A [`UnitOfWork`] collects every movement, record and audit entry a posting
//! produces, evaluating each against the staged (not yet committed) state of
//! its ledger. Nothing reaches the store until [`UnitOfWork::commit`], which
//! hands the whole lot over as one [`LedgerBatch`]. Dropping a unit of work
//! discards it.

use std::collections::BTreeMap;

use serde::Serialize;

use shopledger_audit::{AuditRecordId, NewAuditRecord};
use shopledger_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion};
use shopledger_customers::{Customer, CustomerCommand, CustomerEvent, CustomerId};
use shopledger_events::Event;
use shopledger_inventory::{Product, ProductCommand, ProductEvent, ProductId};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_store::{
    CommitReceipt, LedgerBatch, LedgerStore, StreamAppend, StreamKey, UncommittedEvent,
};
use crate::locks::{LockGuard, ResourceKey};

/// An aggregate loaded into a unit of work, plus what has been staged on it.
#[derive(Debug, Clone)]
struct Staged<A> {
    state: A,
    base_version: u64,
    pending: Vec<UncommittedEvent>,
}

impl<A> Staged<A>
where
    A: Aggregate<Error = DomainError> + Clone,
    A::Event: Event + Serialize,
{
    fn new(state: A) -> Self {
        Self {
            base_version: state.version(),
            state,
            pending: Vec::new(),
        }
    }

    fn execute(&mut self, command: &A::Command) -> LedgerResult<Vec<A::Event>> {
        // Decide on a copy so a rejected command leaves the staged state as it was.
        let mut next = self.state.clone();
        let events = next.execute(command)?;
        let mut encoded = Vec::with_capacity(events.len());
        for event in &events {
            encoded.push(UncommittedEvent::from_typed(event)?);
        }
        self.state = next;
        self.pending.extend(encoded);
        Ok(events)
    }

    fn append(&self, key: StreamKey) -> Option<StreamAppend> {
        if self.pending.is_empty() {
            return None;
        }
        let expected = if self.base_version == 0 {
            ExpectedVersion::NoStream
        } else {
            ExpectedVersion::Exact(self.base_version)
        };
        Some(StreamAppend {
            key,
            expected,
            events: self.pending.clone(),
        })
    }
}

/// One posting's worth of staged writes, tied to the locks that protect them.
pub struct UnitOfWork<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
    guard: &'a LockGuard,
    products: BTreeMap<ProductId, Staged<Product>>,
    customers: BTreeMap<CustomerId, Staged<Customer>>,
    records: Vec<StreamAppend>,
    audit: Vec<(AuditRecordId, NewAuditRecord)>,
}

impl<'a, S: LedgerStore + ?Sized> UnitOfWork<'a, S> {
    pub fn new(store: &'a S, guard: &'a LockGuard) -> Self {
        Self {
            store,
            guard,
            products: BTreeMap::new(),
            customers: BTreeMap::new(),
            records: Vec::new(),
            audit: Vec::new(),
        }
    }

    fn ensure_locked(&self, key: ResourceKey) -> LedgerResult<()> {
        if self.guard.covers(key) {
            Ok(())
        } else {
            Err(LedgerError::ConcurrencyConflict(format!(
                "{key} is not locked by this posting"
            )))
        }
    }

    fn staged_product(&mut self, id: ProductId) -> LedgerResult<&mut Staged<Product>> {
        self.ensure_locked(ResourceKey::Product(id))?;
        if !self.products.contains_key(&id) {
            let state = self.store.load_product(id)?.unwrap_or_else(|| Product::empty(id));
            self.products.insert(id, Staged::new(state));
        }
        self.products
            .get_mut(&id)
            .ok_or_else(|| LedgerError::StorageFailure(format!("staging lost product {id}")))
    }

    fn staged_customer(&mut self, id: CustomerId) -> LedgerResult<&mut Staged<Customer>> {
        self.ensure_locked(ResourceKey::Customer(id))?;
        if !self.customers.contains_key(&id) {
            let state = self.store.load_customer(id)?.unwrap_or_else(|| Customer::empty(id));
            self.customers.insert(id, Staged::new(state));
        }
        self.customers
            .get_mut(&id)
            .ok_or_else(|| LedgerError::StorageFailure(format!("staging lost customer {id}")))
    }

    /// Staged view of a product. Unregistered if the product does not exist.
    pub fn product(&mut self, id: ProductId) -> LedgerResult<&Product> {
        Ok(&self.staged_product(id)?.state)
    }

    /// Staged view of a customer. Unregistered if the customer does not exist.
    pub fn customer(&mut self, id: CustomerId) -> LedgerResult<&Customer> {
        Ok(&self.staged_customer(id)?.state)
    }

    pub fn execute_product(
        &mut self,
        id: ProductId,
        command: &ProductCommand,
    ) -> LedgerResult<Vec<ProductEvent>> {
        self.staged_product(id)?.execute(command)
    }

    pub fn execute_customer(
        &mut self,
        id: CustomerId,
        command: &CustomerCommand,
    ) -> LedgerResult<Vec<CustomerEvent>> {
        self.staged_customer(id)?.execute(command)
    }

    /// Stage an immutable transaction record as a new single-event stream.
    pub fn record<E>(&mut self, key: StreamKey, event: &E) -> LedgerResult<()>
    where
        E: Event + Serialize,
    {
        if self.records.iter().any(|r| r.key == key) {
            return Err(LedgerError::validation(format!("record {key} staged twice")));
        }
        self.records.push(StreamAppend {
            key,
            expected: ExpectedVersion::NoStream,
            events: vec![UncommittedEvent::from_typed(event)?],
        });
        Ok(())
    }

    /// Stage an audit record. It gets its sequence number at commit.
    pub fn audit(&mut self, record: NewAuditRecord) -> AuditRecordId {
        let id = AuditRecordId::generate();
        self.audit.push((id, record));
        id
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
            && self.audit.is_empty()
            && self.products.values().all(|s| s.pending.is_empty())
            && self.customers.values().all(|s| s.pending.is_empty())
    }

    fn into_batch(self) -> LedgerBatch {
        let mut batch = LedgerBatch {
            appends: self.records,
            audit: self.audit,
            ..LedgerBatch::default()
        };
        for (id, staged) in self.products {
            if let Some(append) = staged.append(StreamKey::product(id)) {
                batch.appends.push(append);
                batch.products.push(staged.state);
            }
        }
        for (id, staged) in self.customers {
            if let Some(append) = staged.append(StreamKey::customer(id)) {
                batch.appends.push(append);
                batch.customers.push(staged.state);
            }
        }
        batch
    }

    /// Hand everything staged to the store as one batch.
    pub fn commit(self) -> LedgerResult<CommitReceipt> {
        let store = self.store;
        let batch = self.into_batch();
        tracing::debug!(
            appends = batch.appends.len(),
            audit = batch.audit.len(),
            "committing ledger batch"
        );
        Ok(store.commit(batch)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use rust_decimal_macros::dec;
    use shopledger_core::{MovementId, TxKind, TxRef, UserId};
    use shopledger_inventory::{MoveStock, MovementReason, RegisterProduct};

    use crate::ledger_store::InMemoryLedgerStore;
    use crate::locks::LockManager;

    fn register(id: ProductId) -> ProductCommand {
        ProductCommand::RegisterProduct(RegisterProduct {
            product_id: id,
            name: "Filter".to_string(),
            unit_price: dec!(3),
            cost_basis: dec!(1),
            low_stock_threshold: 0,
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn restock(id: ProductId, delta: i64) -> ProductCommand {
        ProductCommand::MoveStock(MoveStock {
            product_id: id,
            movement_id: MovementId::generate(),
            delta,
            reason: MovementReason::Restock,
            tx_ref: TxRef::new(TxKind::Restock, shopledger_core::AggregateId::new()),
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn staging_requires_a_covering_lock() {
        let store = InMemoryLedgerStore::new();
        let locks = LockManager::new(Duration::from_millis(50));
        let guard = locks.acquire(Vec::new()).unwrap();
        let mut uow = UnitOfWork::new(&store, &guard);

        let err = uow.product(ProductId::generate()).unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrencyConflict(_)));
    }

    #[test]
    fn nothing_is_visible_before_commit() {
        let store = InMemoryLedgerStore::new();
        let locks = LockManager::new(Duration::from_millis(50));
        let id = ProductId::generate();
        let guard = locks.acquire([ResourceKey::Product(id)]).unwrap();

        let mut uow = UnitOfWork::new(&store, &guard);
        uow.execute_product(id, &register(id)).unwrap();
        uow.execute_product(id, &restock(id, 4)).unwrap();
        assert_eq!(uow.product(id).unwrap().stock_on_hand(), 4);
        assert_eq!(store.load_product(id).unwrap(), None);

        let receipt = uow.commit().unwrap();
        assert_eq!(receipt.events.len(), 2);
        assert_eq!(store.load_product(id).unwrap().unwrap().stock_on_hand(), 4);
    }

    #[test]
    fn rejected_command_leaves_staged_state_untouched() {
        let store = InMemoryLedgerStore::new();
        let locks = LockManager::new(Duration::from_millis(50));
        let id = ProductId::generate();
        let guard = locks.acquire([ResourceKey::Product(id)]).unwrap();

        let mut uow = UnitOfWork::new(&store, &guard);
        uow.execute_product(id, &register(id)).unwrap();
        let err = uow.execute_product(id, &restock(id, -1)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(uow.product(id).unwrap().version(), 1);
    }

    #[test]
    fn dropped_unit_of_work_writes_nothing() {
        let store = InMemoryLedgerStore::new();
        let locks = LockManager::new(Duration::from_millis(50));
        let id = ProductId::generate();
        let guard = locks.acquire([ResourceKey::Product(id)]).unwrap();

        {
            let mut uow = UnitOfWork::new(&store, &guard);
            uow.execute_product(id, &register(id)).unwrap();
        }
        assert!(store.product_ids().unwrap().is_empty());
    }
}
