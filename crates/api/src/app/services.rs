//! Ledger wiring for the HTTP layer.
//!
//! The ledger core is synchronous and may block on entity locks, so every
//! call goes through [`AppServices::run_blocking`].

use std::sync::Arc;

use shopledger_infra::{
    ExchangeRateBook, InMemoryLedgerStore, LedgerConfig, LedgerError, LedgerResult, LockManager,
    ReconciliationEngine, ReconciliationReport, StartupReconcile, TransactionCoordinator,
    reconciliation::reconcile_on_startup,
};

pub struct AppServices {
    store: Arc<InMemoryLedgerStore>,
    coordinator: TransactionCoordinator<InMemoryLedgerStore>,
    reconciliation: ReconciliationEngine<InMemoryLedgerStore>,
}

impl AppServices {
    pub fn from_config(config: &LedgerConfig) -> LedgerResult<Self> {
        Self::new(Arc::new(InMemoryLedgerStore::new()), config)
    }

    /// Wire the coordinator and reconciliation engine over an existing store.
    pub fn new(store: Arc<InMemoryLedgerStore>, config: &LedgerConfig) -> LedgerResult<Self> {
        let locks = LockManager::new(config.lock_timeout);
        let rates = ExchangeRateBook::new(
            config.base_currency.clone(),
            config.local_currency.clone(),
            config.local_rate,
        )?;

        Ok(Self {
            coordinator: TransactionCoordinator::new(
                Arc::clone(&store),
                locks.clone(),
                Arc::new(rates),
            ),
            reconciliation: ReconciliationEngine::new(Arc::clone(&store), locks),
            store,
        })
    }

    pub fn store(&self) -> &Arc<InMemoryLedgerStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &TransactionCoordinator<InMemoryLedgerStore> {
        &self.coordinator
    }

    pub fn reconciliation(&self) -> &ReconciliationEngine<InMemoryLedgerStore> {
        &self.reconciliation
    }

    /// Run a ledger call on the blocking pool.
    pub async fn run_blocking<T, F>(self: &Arc<Self>, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&AppServices) -> LedgerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let services = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&services))
            .await
            .map_err(|e| {
                tracing::error!(target: "shopledger::alert", error = %e, "ledger task aborted");
                LedgerError::StorageFailure(format!("ledger task aborted: {e}"))
            })?
    }

    pub async fn reconcile_on_startup(
        self: &Arc<Self>,
        setting: StartupReconcile,
    ) -> LedgerResult<Option<ReconciliationReport>> {
        self.run_blocking(move |s| reconcile_on_startup(s.reconciliation(), setting))
            .await
    }
}
