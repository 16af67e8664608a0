//! Per-entity exclusive locks.
//!
//! A posting locks every product and customer it will touch before it reads
//! anything, and keeps the locks until its batch is committed or abandoned.
//! Keys are always acquired in ascending [`ResourceKey`] order, so two
//! postings over overlapping sets cannot deadlock; a wait that outlasts the
//! configured timeout gives up and releases whatever was already held.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use shopledger_customers::CustomerId;
use shopledger_inventory::ProductId;

/// Lockable ledger entity. Products order before customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    Product(ProductId),
    Customer(CustomerId),
}

impl core::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ResourceKey::Product(id) => write!(f, "product/{id}"),
            ResourceKey::Customer(id) => write!(f, "customer/{id}"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("timed out after {waited_ms}ms waiting for {key}")]
    Timeout { key: ResourceKey, waited_ms: u64 },
}

#[derive(Debug, Default)]
struct LockTable {
    held: Mutex<HashSet<ResourceKey>>,
    released: Condvar,
}

/// Lock manager shared by every posting in the process.
#[derive(Debug, Clone)]
pub struct LockManager {
    table: Arc<LockTable>,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Arc::new(LockTable::default()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire every key in `keys`, in ascending order.
    ///
    /// Each individual wait is bounded by the timeout. On failure nothing
    /// stays held.
    pub fn acquire(
        &self,
        keys: impl IntoIterator<Item = ResourceKey>,
    ) -> Result<LockGuard, LockError> {
        let ordered: BTreeSet<ResourceKey> = keys.into_iter().collect();
        let mut guard = LockGuard {
            table: Arc::clone(&self.table),
            keys: BTreeSet::new(),
        };

        for key in ordered {
            // Dropping `guard` on the error path releases what was taken so far.
            self.acquire_one(key)?;
            guard.keys.insert(key);
        }

        tracing::trace!(keys = guard.keys.len(), "locks acquired");
        Ok(guard)
    }

    fn acquire_one(&self, key: ResourceKey) -> Result<(), LockError> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut held = self.table.held.lock().unwrap_or_else(PoisonError::into_inner);

        while held.contains(&key) {
            let now = Instant::now();
            if now >= deadline {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(%key, waited_ms, "lock wait timed out");
                return Err(LockError::Timeout { key, waited_ms });
            }
            let (next, _) = self
                .table
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            held = next;
        }

        held.insert(key);
        Ok(())
    }

    /// Whether `key` is currently held by anyone.
    pub fn is_locked(&self, key: ResourceKey) -> bool {
        self.table
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

/// Proof of holding a set of locks. Releases them on drop.
#[derive(Debug)]
pub struct LockGuard {
    table: Arc<LockTable>,
    keys: BTreeSet<ResourceKey>,
}

impl LockGuard {
    pub fn covers(&self, key: ResourceKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.keys.iter()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let mut held = self.table.held.lock().unwrap_or_else(PoisonError::into_inner);
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.table.released.notify_all();
    }
}
