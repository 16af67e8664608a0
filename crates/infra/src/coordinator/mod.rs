//! Transaction Coordinator: the only entry point that changes a ledger.
//!
//! Every operation follows the same shape:
//!
//! ```text
//! authorize actor
//!   ↓
//! validate request (no locks held yet)
//!   ↓
//! lock every product / customer touched, in key order
//!   ↓
//! read committed state, price, stage record + movements + audit
//!   ↓
//! commit one batch (all or nothing), release locks
//! ```
//!
//! A rejection at any step leaves the store exactly as it was.

mod catalog;
pub mod requests;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::instrument;

use shopledger_audit::{AuditAction, AuditFilter, AuditRecord, EntityRef, EntityType};
use shopledger_auth::{Actor, Permission, authorize};
use shopledger_customers::{CustomerId, DebtReason};
use shopledger_inventory::{MovementReason, Product, ProductId};
use shopledger_sales::{
    LineInput, Payment, PaymentEvent, PaymentId, PaymentReceipt, Sale, SaleEvent, SaleId,
    SaleReceipt, StockLevel,
};

use crate::audit_log::AuditLog;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{CustomerLedger, ProductLedger};
use crate::ledger_store::{LedgerStore, StreamKey};
use crate::locks::{LockManager, ResourceKey};
use crate::query::{Page, Pagination};
use crate::rates::ExchangeRateBook;
use crate::unit_of_work::UnitOfWork;

pub use requests::{
    CustomerLedgerState, DebtAdjustmentReceipt, DebtAdjustmentRequest, PaymentRequest,
    ProductLedgerState, RegisterCustomerRequest, RegisterProductRequest, RestockReceipt,
    RestockRequest, SaleLineRequest, SaleRequest, UpdatePricingRequest,
};

pub struct TransactionCoordinator<S: ?Sized> {
    store: Arc<S>,
    locks: LockManager,
    rates: Arc<ExchangeRateBook>,
    products: ProductLedger<S>,
    customers: CustomerLedger<S>,
    audit: AuditLog<S>,
}

impl<S: ?Sized> Clone for TransactionCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: self.locks.clone(),
            rates: Arc::clone(&self.rates),
            products: self.products.clone(),
            customers: self.customers.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<S: LedgerStore + ?Sized> TransactionCoordinator<S> {
    pub fn new(store: Arc<S>, locks: LockManager, rates: Arc<ExchangeRateBook>) -> Self {
        Self {
            products: ProductLedger::new(Arc::clone(&store)),
            customers: CustomerLedger::new(Arc::clone(&store)),
            audit: AuditLog::new(Arc::clone(&store)),
            store,
            locks,
            rates,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn rates(&self) -> &ExchangeRateBook {
        &self.rates
    }

    pub fn products(&self) -> &ProductLedger<S> {
        &self.products
    }

    pub fn customers(&self) -> &CustomerLedger<S> {
        &self.customers
    }

    pub fn audit_log(&self) -> &AuditLog<S> {
        &self.audit
    }

    /// Post a sale: stock out for every line, debt for any unpaid portion,
    /// the sale record and its audit trail, as one unit.
    #[instrument(
        skip(self, actor, request),
        fields(actor = %actor.name, lines = request.lines.len(), customer = ?request.customer_id)
    )]
    pub fn post_sale(&self, actor: &Actor, request: SaleRequest) -> LedgerResult<SaleReceipt> {
        settle("sale", self.try_post_sale(actor, request))
    }

    fn try_post_sale(&self, actor: &Actor, request: SaleRequest) -> LedgerResult<SaleReceipt> {
        authorize(actor, &Permission::SELL)?;

        if request.lines.is_empty() {
            return Err(LedgerError::validation("a sale needs at least one line"));
        }
        for (idx, line) in request.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(LedgerError::validation(format!(
                    "line {}: quantity must be positive",
                    idx + 1
                )));
            }
        }
        if request.amount_paid < Decimal::ZERO {
            return Err(LedgerError::validation("amount_paid cannot be negative"));
        }
        let (amount_paid, rate) = self.rates.to_base(request.amount_paid, &request.currency)?;

        let mut keys: BTreeSet<ResourceKey> = request
            .lines
            .iter()
            .map(|l| ResourceKey::Product(l.product_id))
            .collect();
        if let Some(customer_id) = request.customer_id {
            keys.insert(ResourceKey::Customer(customer_id));
        }
        let guard = self.locks.acquire(keys)?;
        let mut uow = UnitOfWork::new(&*self.store, &guard);

        // Price from state read after locking; nothing is staged until the
        // whole sale is priced.
        let mut catalog: Vec<Product> = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let product = uow.product(line.product_id)?;
            if !product.is_registered() {
                return Err(LedgerError::validation(format!(
                    "unknown product {}",
                    line.product_id
                )));
            }
            catalog.push(product.clone());
        }
        if let Some(customer_id) = request.customer_id {
            let customer = uow.customer(customer_id)?;
            if !customer.is_registered() {
                return Err(LedgerError::validation(format!("unknown customer {customer_id}")));
            }
            if !customer.is_active() {
                return Err(LedgerError::validation(format!(
                    "customer {customer_id} is inactive"
                )));
            }
        }

        let inputs: Vec<LineInput<'_>> = request
            .lines
            .iter()
            .zip(&catalog)
            .map(|(line, product)| LineInput {
                product,
                quantity: line.quantity,
                unit_price_override: line.unit_price,
            })
            .collect();

        let now = Utc::now();
        let sale = Sale::price(
            SaleId::generate(),
            request.customer_id,
            &inputs,
            amount_paid,
            request.currency.clone(),
            rate,
            request.amount_paid,
            actor.id,
            now,
        )?;
        let tx_ref = sale.tx_ref();

        uow.record(StreamKey::for_tx(tx_ref), &SaleEvent::SalePosted(sale.clone()))?;

        for line in &sale.lines {
            self.products.apply_movement(
                &mut uow,
                line.product_id,
                -line.quantity,
                MovementReason::Sale,
                tx_ref,
                actor,
                now,
            )?;
        }

        let mut customer_balance = None;
        if let Some(customer_id) = sale.customer_id {
            if sale.debt_portion > Decimal::ZERO {
                let movement = self.customers.apply_movement(
                    &mut uow,
                    customer_id,
                    sale.debt_portion,
                    DebtReason::Sale,
                    tx_ref,
                    actor,
                    now,
                )?;
                customer_balance = Some(movement.balance_after);
            } else {
                customer_balance = Some(uow.customer(customer_id)?.outstanding_debt());
            }
        }

        let sale_entity = EntityRef::new(EntityType::Sale, sale.sale_id.aggregate_id());
        self.audit.append(
            &mut uow,
            actor,
            AuditAction::SaleCreated,
            sale_entity,
            format!(
                "sale of {} line(s), total {}, paid {}, debt {}",
                sale.lines.len(),
                sale.total_amount,
                sale.amount_paid,
                sale.debt_portion
            ),
            request.origin,
            now,
        );
        if let Some(customer_id) = sale.customer_id.filter(|_| sale.debt_portion > Decimal::ZERO) {
            self.audit.append(
                &mut uow,
                actor,
                AuditAction::DebtAdded,
                EntityRef::new(EntityType::Customer, customer_id.aggregate_id()),
                format!("debt of {} added by sale {}", sale.debt_portion, sale.sale_id),
                request.origin,
                now,
            );
        }

        let mut stock_levels = Vec::new();
        for (product_id, _) in sale.quantities_by_product() {
            stock_levels.push(StockLevel::from(uow.product(product_id)?));
        }

        uow.commit()?;

        tracing::info!(
            sale_id = %sale.sale_id,
            total = %sale.total_amount,
            debt = %sale.debt_portion,
            "sale posted"
        );

        Ok(SaleReceipt {
            sale_id: sale.sale_id,
            total_amount: sale.total_amount,
            amount_paid: sale.amount_paid,
            debt_portion: sale.debt_portion,
            overpayment: sale.overpayment,
            currency: sale.tender.currency,
            total_in_currency: sale.tender.total_in_currency,
            stock_levels,
            customer_id: sale.customer_id,
            customer_balance,
        })
    }

    /// Apply a payment against a customer's outstanding debt.
    #[instrument(
        skip(self, actor, request),
        fields(actor = %actor.name, customer = %request.customer_id)
    )]
    pub fn post_payment(
        &self,
        actor: &Actor,
        request: PaymentRequest,
    ) -> LedgerResult<PaymentReceipt> {
        settle("payment", self.try_post_payment(actor, request))
    }

    fn try_post_payment(
        &self,
        actor: &Actor,
        request: PaymentRequest,
    ) -> LedgerResult<PaymentReceipt> {
        authorize(actor, &Permission::SELL)?;

        let now = Utc::now();
        let payment = Payment::new(
            PaymentId::generate(),
            request.customer_id,
            request.amount,
            request.note,
            actor.id,
            now,
        )?;

        let guard = self.locks.acquire([ResourceKey::Customer(payment.customer_id)])?;
        let mut uow = UnitOfWork::new(&*self.store, &guard);

        let customer = uow.customer(payment.customer_id)?;
        if !customer.is_registered() {
            return Err(LedgerError::validation(format!(
                "unknown customer {}",
                payment.customer_id
            )));
        }
        let balance = customer.outstanding_debt();
        if payment.amount > balance {
            return Err(LedgerError::OverpaymentRejected {
                customer_id: payment.customer_id,
                balance,
                amount: payment.amount,
            });
        }

        let tx_ref = payment.tx_ref();
        let movement = self.customers.apply_movement(
            &mut uow,
            payment.customer_id,
            -payment.amount,
            DebtReason::Payment,
            tx_ref,
            actor,
            now,
        )?;
        uow.record(
            StreamKey::for_tx(tx_ref),
            &PaymentEvent::PaymentRecorded(payment.clone()),
        )?;
        self.audit.append(
            &mut uow,
            actor,
            AuditAction::DebtPaid,
            EntityRef::new(EntityType::Customer, payment.customer_id.aggregate_id()),
            match &payment.note {
                Some(note) => format!(
                    "payment of {} ({note}), balance {}",
                    payment.amount, movement.balance_after
                ),
                None => format!(
                    "payment of {}, balance {}",
                    payment.amount, movement.balance_after
                ),
            },
            request.origin,
            now,
        );

        uow.commit()?;

        tracing::info!(
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            balance = %movement.balance_after,
            "payment posted"
        );

        Ok(PaymentReceipt {
            payment_id: payment.payment_id,
            customer_id: payment.customer_id,
            amount: payment.amount,
            balance: movement.balance_after,
        })
    }

    /// Current stock and a page of movement history.
    pub fn product_ledger_state(
        &self,
        product_id: ProductId,
        pagination: Pagination,
    ) -> LedgerResult<ProductLedgerState> {
        let product = self.products.product(product_id)?;
        let movements = self.products.history(product_id, pagination)?;
        Ok(ProductLedgerState {
            stock_on_hand: product.stock_on_hand(),
            low_stock: product.is_low_on_stock(),
            product,
            movements,
        })
    }

    /// Current balance and a page of movement history.
    pub fn customer_ledger_state(
        &self,
        customer_id: CustomerId,
        pagination: Pagination,
    ) -> LedgerResult<CustomerLedgerState> {
        let customer = self.customers.customer(customer_id)?;
        let movements = self.customers.history(customer_id, pagination)?;
        Ok(CustomerLedgerState {
            outstanding_debt: customer.outstanding_debt(),
            customer,
            movements,
        })
    }

    pub fn low_stock(&self) -> LedgerResult<Vec<StockLevel>> {
        Ok(self.products.low_stock()?.iter().map(StockLevel::from).collect())
    }

    pub fn scan_audit(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> LedgerResult<Page<AuditRecord>> {
        self.audit.scan(filter, pagination)
    }
}

/// Log the outcome of a mutating operation.
///
/// Storage failures are already reported on the alert target when they are
/// converted, so they are not repeated here.
fn settle<T>(operation: &'static str, result: LedgerResult<T>) -> LedgerResult<T> {
    if let Err(err) = &result {
        if !matches!(err, LedgerError::StorageFailure(_)) {
            tracing::warn!(operation, code = err.code(), error = %err, "posting rejected");
        }
    }
    result
}
