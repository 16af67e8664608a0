use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use shopledger_auth::Actor;
use shopledger_core::{MovementId, TxRef};
use shopledger_customers::{
    Customer, CustomerCommand, CustomerEvent, CustomerId, DebtMovement, DebtReason, MoveDebt,
};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_store::{LedgerStore, StreamKey};
use crate::query::{Page, Pagination};
use crate::unit_of_work::UnitOfWork;

/// Per-customer debt ledger. Balances are in the base currency.
pub struct CustomerLedger<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for CustomerLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore + ?Sized> CustomerLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stage one signed debt movement.
    ///
    /// Re-validates the balance even when the caller already has: a movement
    /// that would take the debt below zero fails with `DebtWouldGoNegative`.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, uow, actor), fields(actor = %actor.name))]
    pub fn apply_movement(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        customer_id: CustomerId,
        delta: Decimal,
        reason: DebtReason,
        tx_ref: TxRef,
        actor: &Actor,
        occurred_at: DateTime<Utc>,
    ) -> LedgerResult<DebtMovement> {
        if !uow.customer(customer_id)?.is_registered() {
            return Err(LedgerError::validation(format!("unknown customer {customer_id}")));
        }

        let command = CustomerCommand::MoveDebt(MoveDebt {
            customer_id,
            movement_id: MovementId::generate(),
            delta,
            reason,
            tx_ref,
            actor: actor.id,
            occurred_at,
        });
        let events = uow.execute_customer(customer_id, &command)?;

        events
            .iter()
            .find_map(CustomerEvent::as_movement)
            .cloned()
            .ok_or_else(|| LedgerError::validation("debt movement produced no event"))
    }

    pub fn customer(&self, customer_id: CustomerId) -> LedgerResult<Customer> {
        self.store
            .load_customer(customer_id)?
            .filter(Customer::is_registered)
            .ok_or_else(|| LedgerError::not_found(format!("customer {customer_id}")))
    }

    pub fn current_balance(&self, customer_id: CustomerId) -> LedgerResult<Decimal> {
        Ok(self.customer(customer_id)?.outstanding_debt())
    }

    /// Every debt movement of a customer, oldest first.
    pub fn movements(&self, customer_id: CustomerId) -> LedgerResult<Vec<DebtMovement>> {
        let stream = self.store.load_stream(&StreamKey::customer(customer_id))?;
        let mut movements = Vec::new();
        for stored in &stream {
            if let CustomerEvent::DebtMoved(m) = stored.decode::<CustomerEvent>()?.into_payload() {
                movements.push(m);
            }
        }
        Ok(movements)
    }

    pub fn history(
        &self,
        customer_id: CustomerId,
        pagination: Pagination,
    ) -> LedgerResult<Page<DebtMovement>> {
        self.customer(customer_id)?;
        Ok(pagination.apply(self.movements(customer_id)?))
    }
}
