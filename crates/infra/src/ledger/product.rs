use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use shopledger_auth::Actor;
use shopledger_core::{MovementId, TxRef};
use shopledger_inventory::{
    InventoryMovement, MoveStock, MovementReason, Product, ProductCommand, ProductEvent, ProductId,
};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_store::{LedgerStore, StreamKey};
use crate::query::{Page, Pagination};
use crate::unit_of_work::UnitOfWork;

/// Per-product stock ledger.
pub struct ProductLedger<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ProductLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore + ?Sized> ProductLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stage one signed stock movement.
    ///
    /// Evaluated against the staged stock, so several movements on the same
    /// product within one posting see each other. Fails with
    /// `InsufficientStock` if the stock would go below zero.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, uow, actor), fields(actor = %actor.name))]
    pub fn apply_movement(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        product_id: ProductId,
        delta: i64,
        reason: MovementReason,
        tx_ref: TxRef,
        actor: &Actor,
        occurred_at: DateTime<Utc>,
    ) -> LedgerResult<InventoryMovement> {
        if !uow.product(product_id)?.is_registered() {
            return Err(LedgerError::validation(format!("unknown product {product_id}")));
        }

        let command = ProductCommand::MoveStock(MoveStock {
            product_id,
            movement_id: MovementId::generate(),
            delta,
            reason,
            tx_ref,
            actor: actor.id,
            occurred_at,
        });
        let events = uow.execute_product(product_id, &command)?;

        events
            .iter()
            .find_map(ProductEvent::as_movement)
            .cloned()
            .ok_or_else(|| LedgerError::validation("stock movement produced no event"))
    }

    pub fn product(&self, product_id: ProductId) -> LedgerResult<Product> {
        self.store
            .load_product(product_id)?
            .filter(Product::is_registered)
            .ok_or_else(|| LedgerError::not_found(format!("product {product_id}")))
    }

    pub fn current_stock(&self, product_id: ProductId) -> LedgerResult<i64> {
        Ok(self.product(product_id)?.stock_on_hand())
    }

    /// Every movement of a product, oldest first.
    pub fn movements(&self, product_id: ProductId) -> LedgerResult<Vec<InventoryMovement>> {
        let stream = self.store.load_stream(&StreamKey::product(product_id))?;
        let mut movements = Vec::new();
        for stored in &stream {
            if let ProductEvent::StockMoved(m) = stored.decode::<ProductEvent>()?.into_payload() {
                movements.push(m);
            }
        }
        Ok(movements)
    }

    pub fn history(
        &self,
        product_id: ProductId,
        pagination: Pagination,
    ) -> LedgerResult<Page<InventoryMovement>> {
        // Unknown products are NotFound rather than an empty page.
        self.product(product_id)?;
        Ok(pagination.apply(self.movements(product_id)?))
    }

    /// Registered products at or under their low-stock threshold.
    pub fn low_stock(&self) -> LedgerResult<Vec<Product>> {
        let mut out = Vec::new();
        for id in self.store.product_ids()? {
            if let Some(product) = self.store.load_product(id)? {
                if product.is_registered() && product.is_low_on_stock() {
                    out.push(product);
                }
            }
        }
        Ok(out)
    }
}
