//! Catalog, restock and customer maintenance. Same lock / stage / commit
//! discipline as the postings.

use chrono::{DateTime, Utc};
use tracing::instrument;

use shopledger_audit::{AuditAction, EntityRef, EntityType};
use shopledger_auth::{Actor, Permission, authorize};
use shopledger_customers::{
    Customer, CustomerCommand, CustomerId, DebtAdjustment, DebtAdjustmentEvent, DebtAdjustmentId,
    DebtReason, RegisterCustomer, SetCustomerActive,
};
use shopledger_inventory::{
    MovementReason, Product, ProductCommand, ProductId, RegisterProduct, Restock, RestockEvent,
    RestockId, UpdatePricing,
};

use super::{TransactionCoordinator, settle};
use super::requests::{
    DebtAdjustmentReceipt, DebtAdjustmentRequest, RegisterCustomerRequest, RegisterProductRequest,
    RestockReceipt, RestockRequest, UpdatePricingRequest,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger_store::{LedgerStore, StreamKey};
use crate::locks::ResourceKey;
use crate::unit_of_work::UnitOfWork;

impl<S: LedgerStore + ?Sized> TransactionCoordinator<S> {
    /// Receive stock: an immutable restock record and its RESTOCK movement.
    #[instrument(
        skip(self, actor, request),
        fields(actor = %actor.name, product = %request.product_id)
    )]
    pub fn restock(&self, actor: &Actor, request: RestockRequest) -> LedgerResult<RestockReceipt> {
        settle("restock", self.try_restock(actor, request))
    }

    fn try_restock(&self, actor: &Actor, request: RestockRequest) -> LedgerResult<RestockReceipt> {
        authorize(actor, &Permission::RESTOCK)?;

        let now = Utc::now();
        let restock = Restock::new(
            RestockId::generate(),
            request.product_id,
            request.quantity,
            request.note,
            actor.id,
            now,
        )?;

        let guard = self.locks.acquire([ResourceKey::Product(restock.product_id)])?;
        let mut uow = UnitOfWork::new(&*self.store, &guard);
        if !uow.product(restock.product_id)?.is_registered() {
            return Err(LedgerError::validation(format!(
                "unknown product {}",
                restock.product_id
            )));
        }

        let stock_after = self.stage_restock(&mut uow, actor, &restock, request.origin, now)?;
        let product = uow.product(restock.product_id)?.clone();
        uow.commit()?;

        tracing::info!(
            restock_id = %restock.restock_id,
            quantity = restock.quantity,
            stock = stock_after,
            "restock posted"
        );

        Ok(RestockReceipt {
            restock_id: restock.restock_id,
            product_id: restock.product_id,
            quantity: restock.quantity,
            stock_on_hand: product.stock_on_hand(),
            low_stock: product.is_low_on_stock(),
        })
    }

    /// Stage a restock record, its movement and its audit record. Returns the
    /// stock after the movement.
    fn stage_restock(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        actor: &Actor,
        restock: &Restock,
        origin: Option<std::net::IpAddr>,
        now: DateTime<Utc>,
    ) -> LedgerResult<i64> {
        let tx_ref = restock.tx_ref();
        uow.record(
            StreamKey::for_tx(tx_ref),
            &RestockEvent::RestockRecorded(restock.clone()),
        )?;
        let movement = self.products.apply_movement(
            uow,
            restock.product_id,
            restock.quantity,
            MovementReason::Restock,
            tx_ref,
            actor,
            now,
        )?;
        self.audit.append(
            uow,
            actor,
            AuditAction::InventoryRestocked,
            EntityRef::new(EntityType::Product, restock.product_id.aggregate_id()),
            match &restock.note {
                Some(note) => format!(
                    "received {} ({note}), stock {}",
                    restock.quantity, movement.stock_after
                ),
                None => format!("received {}, stock {}", restock.quantity, movement.stock_after),
            },
            origin,
            now,
        );
        Ok(movement.stock_after)
    }

    #[instrument(skip(self, actor, request), fields(actor = %actor.name))]
    pub fn register_product(
        &self,
        actor: &Actor,
        request: RegisterProductRequest,
    ) -> LedgerResult<Product> {
        settle("register_product", self.try_register_product(actor, request))
    }

    fn try_register_product(
        &self,
        actor: &Actor,
        request: RegisterProductRequest,
    ) -> LedgerResult<Product> {
        authorize(actor, &Permission::MANAGE_CATALOG)?;
        if request.opening_stock < 0 {
            return Err(LedgerError::validation("opening_stock cannot be negative"));
        }

        let now = Utc::now();
        let product_id = ProductId::generate();
        let guard = self.locks.acquire([ResourceKey::Product(product_id)])?;
        let mut uow = UnitOfWork::new(&*self.store, &guard);

        uow.execute_product(
            product_id,
            &ProductCommand::RegisterProduct(RegisterProduct {
                product_id,
                name: request.name,
                unit_price: request.unit_price,
                cost_basis: request.cost_basis,
                low_stock_threshold: request.low_stock_threshold,
                actor: actor.id,
                occurred_at: now,
            }),
        )?;
        let name = uow.product(product_id)?.name().to_string();
        self.audit.append(
            &mut uow,
            actor,
            AuditAction::ProductRegistered,
            EntityRef::new(EntityType::Product, product_id.aggregate_id()),
            format!(
                "registered {name} at {}, low-stock threshold {}",
                request.unit_price, request.low_stock_threshold
            ),
            request.origin,
            now,
        );

        if request.opening_stock > 0 {
            let restock = Restock::new(
                RestockId::generate(),
                product_id,
                request.opening_stock,
                Some("opening stock".to_string()),
                actor.id,
                now,
            )?;
            self.stage_restock(&mut uow, actor, &restock, request.origin, now)?;
        }

        let product = uow.product(product_id)?.clone();
        uow.commit()?;

        tracing::info!(product_id = %product_id, name = %product.name(), "product registered");
        Ok(product)
    }

    /// Change catalog price, cost basis and threshold. Never touches stock.
    #[instrument(
        skip(self, actor, request),
        fields(actor = %actor.name, product = %request.product_id)
    )]
    pub fn update_pricing(
        &self,
        actor: &Actor,
        request: UpdatePricingRequest,
    ) -> LedgerResult<Product> {
        settle("update_pricing", self.try_update_pricing(actor, request))
    }

    fn try_update_pricing(
        &self,
        actor: &Actor,
        request: UpdatePricingRequest,
    ) -> LedgerResult<Product> {
        authorize(actor, &Permission::MANAGE_CATALOG)?;

        let now = Utc::now();
        let product_id = request.product_id;
        let guard = self.locks.acquire([ResourceKey::Product(product_id)])?;
        let mut uow = UnitOfWork::new(&*self.store, &guard);

        let before = uow.product(product_id)?;
        if !before.is_registered() {
            return Err(LedgerError::not_found(format!("product {product_id}")));
        }
        let old_price = before.unit_price();

        uow.execute_product(
            product_id,
            &ProductCommand::UpdatePricing(UpdatePricing {
                product_id,
                unit_price: request.unit_price,
                cost_basis: request.cost_basis,
                low_stock_threshold: request.low_stock_threshold,
                actor: actor.id,
                occurred_at: now,
            }),
        )?;
        self.audit.append(
            &mut uow,
            actor,
            AuditAction::PricingUpdated,
            EntityRef::new(EntityType::Product, product_id.aggregate_id()),
            format!(
                "price {old_price} -> {}, low-stock threshold {}",
                request.unit_price, request.low_stock_threshold
            ),
            request.origin,
            now,
        );

        let product = uow.product(product_id)?.clone();
        uow.commit()?;

        tracing::info!(
            product_id = %product_id,
            unit_price = %product.unit_price(),
            "pricing updated"
        );
        Ok(product)
    }

    #[instrument(skip(self, actor, request), fields(actor = %actor.name))]
    pub fn register_customer(
        &self,
        actor: &Actor,
        request: RegisterCustomerRequest,
    ) -> LedgerResult<Customer> {
        settle("register_customer", self.try_register_customer(actor, request))
    }

    fn try_register_customer(
        &self,
        actor: &Actor,
        request: RegisterCustomerRequest,
    ) -> LedgerResult<Customer> {
        authorize(actor, &Permission::SELL)?;

        let now = Utc::now();
        let customer_id = CustomerId::generate();
        let guard = self.locks.acquire([ResourceKey::Customer(customer_id)])?;
        let mut uow = UnitOfWork::new(&*self.store, &guard);

        uow.execute_customer(
            customer_id,
            &CustomerCommand::RegisterCustomer(RegisterCustomer {
                customer_id,
                name: request.name,
                contact: request.contact,
                actor: actor.id,
                occurred_at: now,
            }),
        )?;
        let customer = uow.customer(customer_id)?.clone();
        self.audit.append(
            &mut uow,
            actor,
            AuditAction::CustomerAdded,
            EntityRef::new(EntityType::Customer, customer_id.aggregate_id()),
            format!("registered customer {}", customer.name()),
            request.origin,
            now,
        );
        uow.commit()?;

        tracing::info!(customer_id = %customer_id, "customer registered");
        Ok(customer)
    }

    /// Activate or deactivate a customer. Setting the current status again
    /// is a no-op and writes nothing.
    #[instrument(skip(self, actor, origin), fields(actor = %actor.name))]
    pub fn set_customer_active(
        &self,
        actor: &Actor,
        customer_id: CustomerId,
        active: bool,
        origin: Option<std::net::IpAddr>,
    ) -> LedgerResult<Customer> {
        settle(
            "set_customer_active",
            self.try_set_customer_active(actor, customer_id, active, origin),
        )
    }

    fn try_set_customer_active(
        &self,
        actor: &Actor,
        customer_id: CustomerId,
        active: bool,
        origin: Option<std::net::IpAddr>,
    ) -> LedgerResult<Customer> {
        authorize(actor, &Permission::SELL)?;

        let now = Utc::now();
        let guard = self.locks.acquire([ResourceKey::Customer(customer_id)])?;
        let mut uow = UnitOfWork::new(&*self.store, &guard);
        if !uow.customer(customer_id)?.is_registered() {
            return Err(LedgerError::not_found(format!("customer {customer_id}")));
        }

        let events = uow.execute_customer(
            customer_id,
            &CustomerCommand::SetCustomerActive(SetCustomerActive {
                customer_id,
                active,
                actor: actor.id,
                occurred_at: now,
            }),
        )?;
        let customer = uow.customer(customer_id)?.clone();
        if events.is_empty() {
            return Ok(customer);
        }

        self.audit.append(
            &mut uow,
            actor,
            AuditAction::CustomerStatusChanged,
            EntityRef::new(EntityType::Customer, customer_id.aggregate_id()),
            if active { "customer activated" } else { "customer deactivated" },
            origin,
            now,
        );
        uow.commit()?;

        tracing::info!(customer_id = %customer_id, active, "customer status changed");
        Ok(customer)
    }

    /// Set a customer's debt to `new_balance` by hand: an immutable
    /// adjustment record and an ADJUSTMENT movement for the difference.
    #[instrument(
        skip(self, actor, request),
        fields(actor = %actor.name, customer = %request.customer_id)
    )]
    pub fn correct_customer_debt(
        &self,
        actor: &Actor,
        request: DebtAdjustmentRequest,
    ) -> LedgerResult<DebtAdjustmentReceipt> {
        settle("correct_customer_debt", self.try_correct_customer_debt(actor, request))
    }

    fn try_correct_customer_debt(
        &self,
        actor: &Actor,
        request: DebtAdjustmentRequest,
    ) -> LedgerResult<DebtAdjustmentReceipt> {
        authorize(actor, &Permission::ADJUST_DEBT)?;

        let customer_id = request.customer_id;
        let guard = self.locks.acquire([ResourceKey::Customer(customer_id)])?;
        let mut uow = UnitOfWork::new(&*self.store, &guard);
        let customer = uow.customer(customer_id)?;
        if !customer.is_registered() {
            return Err(LedgerError::not_found(format!("customer {customer_id}")));
        }

        let now = Utc::now();
        let adjustment = DebtAdjustment::new(
            DebtAdjustmentId::generate(),
            customer_id,
            customer.outstanding_debt(),
            request.new_balance,
            request.reason,
            actor.id,
            now,
        )?;
        let tx_ref = adjustment.tx_ref();

        uow.record(
            StreamKey::for_tx(tx_ref),
            &DebtAdjustmentEvent::DebtAdjusted(adjustment.clone()),
        )?;
        self.customers.apply_movement(
            &mut uow,
            customer_id,
            adjustment.adjustment,
            DebtReason::Adjustment,
            tx_ref,
            actor,
            now,
        )?;
        self.audit.append(
            &mut uow,
            actor,
            AuditAction::DebtManuallyAdjusted,
            EntityRef::new(EntityType::Customer, customer_id.aggregate_id()),
            format!(
                "debt set from {} to {} (adjustment {:+}): {}",
                adjustment.old_balance,
                adjustment.new_balance,
                adjustment.adjustment,
                adjustment.reason
            ),
            request.origin,
            now,
        );
        uow.commit()?;

        tracing::info!(
            adjustment_id = %adjustment.adjustment_id,
            %customer_id,
            adjustment = %adjustment.adjustment,
            "customer debt adjusted"
        );

        Ok(DebtAdjustmentReceipt {
            adjustment_id: adjustment.adjustment_id,
            customer_id,
            old_balance: adjustment.old_balance,
            new_balance: adjustment.new_balance,
            adjustment: adjustment.adjustment,
        })
    }
}
