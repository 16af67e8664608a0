//! Reconciliation Engine: detect and repair drift between a ledger's stored
//! value and its movement history.
//!
//! Each entity is checked while holding only that entity's lock, so a scan
//! never stalls postings for other products or customers. `verify` writes
//! nothing. `repair` posts one CORRECTION movement per drifted entity, backed
//! by an immutable correction record and an audit entry, all in one commit.
//! After a repair the stored value equals the recomputed one, so an
//! immediate second repair finds nothing to do.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shopledger_audit::{AuditAction, EntityRef, EntityType};
use shopledger_auth::{Actor, Permission, authorize};
use shopledger_core::{MovementId, TxKind, TxRef, UserId, typed_id};
use shopledger_customers::{CustomerId, DebtReason, recompute_debt};
use shopledger_events::Event;
use shopledger_inventory::{MovementReason, ProductId, recompute_stock};

use crate::audit_log::AuditLog;
use crate::config::StartupReconcile;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{CustomerLedger, ProductLedger};
use crate::ledger_store::{LedgerStore, StreamKey};
use crate::locks::{LockManager, ResourceKey};
use crate::unit_of_work::UnitOfWork;

typed_id!(
    /// Identifier of a correction record.
    CorrectionId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    Verify,
    Repair,
}

/// Which ledgers to check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ids", rename_all = "snake_case")]
pub enum ReconcileScope {
    All,
    Products(Vec<ProductId>),
    Customers(Vec<CustomerId>),
}

/// A stored value that disagrees with its movement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ledger", rename_all = "snake_case")]
pub enum Drift {
    Stock {
        product_id: ProductId,
        recorded: i64,
        computed: i64,
    },
    Debt {
        customer_id: CustomerId,
        recorded: Decimal,
        computed: Decimal,
    },
}

impl Drift {
    pub fn entity(&self) -> EntityRef {
        match self {
            Drift::Stock { product_id, .. } => {
                EntityRef::new(EntityType::Product, product_id.aggregate_id())
            }
            Drift::Debt { customer_id, .. } => {
                EntityRef::new(EntityType::Customer, customer_id.aggregate_id())
            }
        }
    }

    /// `computed - recorded`, the delta a correction posts.
    pub fn discrepancy(&self) -> Decimal {
        match self {
            Drift::Stock {
                recorded, computed, ..
            } => Decimal::from(*computed - *recorded),
            Drift::Debt {
                recorded, computed, ..
            } => *computed - *recorded,
        }
    }

    /// A negative recomputed value cannot be written back without breaking
    /// the non-negativity invariant.
    pub fn is_repairable(&self) -> bool {
        match self {
            Drift::Stock { computed, .. } => *computed >= 0,
            Drift::Debt { computed, .. } => !computed.is_sign_negative() || computed.is_zero(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Drift::Stock {
                recorded, computed, ..
            } => format!("stock recorded {recorded}, movement history sums to {computed}"),
            Drift::Debt {
                recorded, computed, ..
            } => format!("debt recorded {recorded}, movement history sums to {computed}"),
        }
    }
}

/// Immutable record a CORRECTION movement points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub correction_id: CorrectionId,
    pub drift: Drift,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl Correction {
    pub fn tx_ref(&self) -> TxRef {
        TxRef::new(TxKind::Correction, self.correction_id.aggregate_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectionEvent {
    CorrectionRecorded(Correction),
}

impl Event for CorrectionEvent {
    fn event_type(&self) -> &'static str {
        "ledger.correction.recorded"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CorrectionEvent::CorrectionRecorded(c) => c.occurred_at,
        }
    }
}

/// A drift `repair` left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrepairedDrift {
    pub drift: Drift,
    pub reason: String,
}

/// A movement whose transaction reference resolves to no committed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanMovement {
    pub entity: EntityRef,
    pub movement_id: MovementId,
    pub tx_ref: TxRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub mode: ReconcileMode,
    /// Ledgers checked.
    pub scanned: usize,
    /// Drift found during this run, before any repair.
    pub drifts: Vec<Drift>,
    pub corrections: Vec<Correction>,
    pub unrepaired: Vec<UnrepairedDrift>,
    pub orphans: Vec<OrphanMovement>,
}

impl ReconciliationReport {
    fn new(mode: ReconcileMode) -> Self {
        Self {
            mode,
            scanned: 0,
            drifts: Vec::new(),
            corrections: Vec::new(),
            unrepaired: Vec::new(),
            orphans: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.drifts.is_empty()
    }

    /// `DriftDetected` unless the run found no drift.
    pub fn ensure_clean(&self) -> LedgerResult<()> {
        if self.is_clean() {
            Ok(())
        } else {
            Err(LedgerError::DriftDetected {
                count: self.drifts.len(),
            })
        }
    }
}

pub struct ReconciliationEngine<S: ?Sized> {
    store: Arc<S>,
    locks: LockManager,
    products: ProductLedger<S>,
    customers: CustomerLedger<S>,
    audit: AuditLog<S>,
}

impl<S: ?Sized> Clone for ReconciliationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: self.locks.clone(),
            products: self.products.clone(),
            customers: self.customers.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<S: LedgerStore + ?Sized> ReconciliationEngine<S> {
    pub fn new(store: Arc<S>, locks: LockManager) -> Self {
        Self {
            products: ProductLedger::new(Arc::clone(&store)),
            customers: CustomerLedger::new(Arc::clone(&store)),
            audit: AuditLog::new(Arc::clone(&store)),
            store,
            locks,
        }
    }

    pub fn verify(
        &self,
        actor: &Actor,
        scope: &ReconcileScope,
    ) -> LedgerResult<ReconciliationReport> {
        self.run(actor, scope, ReconcileMode::Verify)
    }

    pub fn repair(
        &self,
        actor: &Actor,
        scope: &ReconcileScope,
    ) -> LedgerResult<ReconciliationReport> {
        self.run(actor, scope, ReconcileMode::Repair)
    }

    #[instrument(skip(self, actor, scope), fields(actor = %actor.name))]
    pub fn run(
        &self,
        actor: &Actor,
        scope: &ReconcileScope,
        mode: ReconcileMode,
    ) -> LedgerResult<ReconciliationReport> {
        authorize(actor, &Permission::RECONCILE)?;

        let (product_ids, customer_ids) = self.resolve(scope)?;
        let mut report = ReconciliationReport::new(mode);

        for product_id in product_ids {
            self.check_product(actor, product_id, mode, &mut report)?;
        }
        for customer_id in customer_ids {
            self.check_customer(actor, customer_id, mode, &mut report)?;
        }

        if report.is_clean() {
            tracing::info!(
                scanned = report.scanned,
                orphans = report.orphans.len(),
                "ledgers reconciled"
            );
        } else {
            tracing::warn!(
                scanned = report.scanned,
                drifts = report.drifts.len(),
                corrections = report.corrections.len(),
                unrepaired = report.unrepaired.len(),
                "ledger drift detected"
            );
        }
        Ok(report)
    }

    fn resolve(&self, scope: &ReconcileScope) -> LedgerResult<(Vec<ProductId>, Vec<CustomerId>)> {
        match scope {
            ReconcileScope::All => Ok((self.store.product_ids()?, self.store.customer_ids()?)),
            ReconcileScope::Products(ids) => {
                let mut ids = ids.clone();
                ids.sort();
                ids.dedup();
                for id in &ids {
                    self.products.product(*id)?;
                }
                Ok((ids, Vec::new()))
            }
            ReconcileScope::Customers(ids) => {
                let mut ids = ids.clone();
                ids.sort();
                ids.dedup();
                for id in &ids {
                    self.customers.customer(*id)?;
                }
                Ok((Vec::new(), ids))
            }
        }
    }

    fn check_product(
        &self,
        actor: &Actor,
        product_id: ProductId,
        mode: ReconcileMode,
        report: &mut ReconciliationReport,
    ) -> LedgerResult<()> {
        let guard = self.locks.acquire([ResourceKey::Product(product_id)])?;
        let Some(product) = self.store.load_product(product_id)? else {
            return Ok(());
        };
        report.scanned += 1;

        let movements = self.products.movements(product_id)?;
        let entity = EntityRef::new(EntityType::Product, product_id.aggregate_id());
        for m in &movements {
            if !self.store.stream_exists(&StreamKey::for_tx(m.tx_ref))? {
                report.orphans.push(OrphanMovement {
                    entity,
                    movement_id: m.movement_id,
                    tx_ref: m.tx_ref,
                });
            }
        }

        let computed = recompute_stock(&movements);
        if computed == product.stock_on_hand() {
            return Ok(());
        }
        let drift = Drift::Stock {
            product_id,
            recorded: product.stock_on_hand(),
            computed,
        };
        tracing::warn!(%product_id, recorded = product.stock_on_hand(), computed, "stock drift");
        report.drifts.push(drift.clone());

        if mode == ReconcileMode::Repair {
            let delta = computed - product.stock_on_hand();
            let mut uow = UnitOfWork::new(&*self.store, &guard);
            let outcome = self.stage_correction(&mut uow, actor, drift.clone(), |uow, tx_ref, now| {
                self.products
                    .apply_movement(
                        uow,
                        product_id,
                        delta,
                        MovementReason::Correction,
                        tx_ref,
                        actor,
                        now,
                    )
                    .map(|_| ())
            });
            self.finish_repair(uow, outcome, drift, report)?;
        }
        Ok(())
    }

    fn check_customer(
        &self,
        actor: &Actor,
        customer_id: CustomerId,
        mode: ReconcileMode,
        report: &mut ReconciliationReport,
    ) -> LedgerResult<()> {
        let guard = self.locks.acquire([ResourceKey::Customer(customer_id)])?;
        let Some(customer) = self.store.load_customer(customer_id)? else {
            return Ok(());
        };
        report.scanned += 1;

        let movements = self.customers.movements(customer_id)?;
        let entity = EntityRef::new(EntityType::Customer, customer_id.aggregate_id());
        for m in &movements {
            if !self.store.stream_exists(&StreamKey::for_tx(m.tx_ref))? {
                report.orphans.push(OrphanMovement {
                    entity,
                    movement_id: m.movement_id,
                    tx_ref: m.tx_ref,
                });
            }
        }

        let recorded = customer.outstanding_debt();
        let computed = recompute_debt(&movements);
        if computed == recorded {
            return Ok(());
        }
        let drift = Drift::Debt {
            customer_id,
            recorded,
            computed,
        };
        tracing::warn!(%customer_id, %recorded, %computed, "debt drift");
        report.drifts.push(drift.clone());

        if mode == ReconcileMode::Repair {
            let delta = computed - recorded;
            let mut uow = UnitOfWork::new(&*self.store, &guard);
            let outcome = self.stage_correction(&mut uow, actor, drift.clone(), |uow, tx_ref, now| {
                self.customers
                    .apply_movement(
                        uow,
                        customer_id,
                        delta,
                        DebtReason::Correction,
                        tx_ref,
                        actor,
                        now,
                    )
                    .map(|_| ())
            });
            self.finish_repair(uow, outcome, drift, report)?;
        }
        Ok(())
    }

    /// Stage the correction record, the movement `apply` posts, and the
    /// audit entry. `Ok(None)` means the drift cannot be repaired.
    fn stage_correction(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        actor: &Actor,
        drift: Drift,
        apply: impl FnOnce(&mut UnitOfWork<'_, S>, TxRef, DateTime<Utc>) -> LedgerResult<()>,
    ) -> LedgerResult<Option<Correction>> {
        if !drift.is_repairable() {
            return Ok(None);
        }

        let now = Utc::now();
        let correction = Correction {
            correction_id: CorrectionId::generate(),
            drift,
            actor: actor.id,
            occurred_at: now,
        };
        let tx_ref = correction.tx_ref();
        uow.record(
            StreamKey::for_tx(tx_ref),
            &CorrectionEvent::CorrectionRecorded(correction.clone()),
        )?;
        apply(uow, tx_ref, now)?;

        let action = match correction.drift {
            Drift::Stock { .. } => AuditAction::StockCorrected,
            Drift::Debt { .. } => AuditAction::DebtCorrected,
        };
        self.audit.append(
            uow,
            actor,
            action,
            correction.drift.entity(),
            format!(
                "{}; corrected by {} to match movement history",
                correction.drift.describe(),
                correction.drift.discrepancy()
            ),
            None,
            now,
        );
        Ok(Some(correction))
    }

    fn finish_repair(
        &self,
        uow: UnitOfWork<'_, S>,
        outcome: LedgerResult<Option<Correction>>,
        drift: Drift,
        report: &mut ReconciliationReport,
    ) -> LedgerResult<()> {
        match outcome {
            Ok(Some(correction)) => {
                uow.commit()?;
                tracing::info!(
                    correction_id = %correction.correction_id,
                    discrepancy = %correction.drift.discrepancy(),
                    "drift corrected"
                );
                report.corrections.push(correction);
            }
            Ok(None) => report.unrepaired.push(UnrepairedDrift {
                drift,
                reason: "movement history sums to a negative value".to_string(),
            }),
            Err(LedgerError::StorageFailure(msg)) => return Err(LedgerError::StorageFailure(msg)),
            Err(err) => report.unrepaired.push(UnrepairedDrift {
                drift,
                reason: err.to_string(),
            }),
        }
        Ok(())
    }
}

/// Run the reconciliation the configuration asks for at startup.
pub fn reconcile_on_startup<S: LedgerStore + ?Sized>(
    engine: &ReconciliationEngine<S>,
    setting: StartupReconcile,
) -> LedgerResult<Option<ReconciliationReport>> {
    let StartupReconcile::Run(mode) = setting else {
        tracing::info!("startup reconciliation disabled");
        return Ok(None);
    };
    let report = engine.run(&Actor::system(), &ReconcileScope::All, mode)?;
    Ok(Some(report))
}
