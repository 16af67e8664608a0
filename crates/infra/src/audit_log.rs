//! Append-only audit log.
//!
//! Entries are staged on the posting's unit of work and committed with it, so
//! an audit record exists exactly when the change it describes does. There is
//! no update or delete path.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use shopledger_audit::{
    AuditAction, AuditFilter, AuditRecord, AuditRecordId, EntityRef, NewAuditRecord,
};
use shopledger_auth::Actor;

use crate::error::LedgerResult;
use crate::ledger_store::LedgerStore;
use crate::query::{Page, Pagination};
use crate::unit_of_work::UnitOfWork;

pub struct AuditLog<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for AuditLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore + ?Sized> AuditLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        actor: &Actor,
        action: AuditAction,
        entity: EntityRef,
        description: impl Into<String>,
        origin: Option<IpAddr>,
        occurred_at: DateTime<Utc>,
    ) -> AuditRecordId {
        uow.audit(NewAuditRecord::new(
            actor,
            action,
            entity,
            description,
            origin,
            occurred_at,
        ))
    }

    /// Sequential scan, oldest first.
    pub fn scan(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> LedgerResult<Page<AuditRecord>> {
        Ok(self.store.scan_audit(filter, pagination)?)
    }
}
