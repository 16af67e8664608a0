use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopledger_core::{
    Aggregate, AggregateRoot, DomainError, MovementId, TxKind, TxRef, UserId,
    ensure_money_scale, ensure_non_negative, typed_id,
};
use shopledger_events::Event;

typed_id!(
    /// Product identifier.
    ProductId
);

/// Why a product's stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementReason {
    Sale,
    Restock,
    /// Reconciliation re-anchoring the stored value to the movement log.
    Correction,
}

impl MovementReason {
    /// The transaction record kind a movement with this reason must reference.
    pub fn tx_kind(self) -> TxKind {
        match self {
            MovementReason::Sale => TxKind::Sale,
            MovementReason::Restock => TxKind::Restock,
            MovementReason::Correction => TxKind::Correction,
        }
    }
}

/// Aggregate root: Product.
///
/// `stock_on_hand` is the stored ledger balance. It changes only by applying
/// a [`ProductEvent::StockMoved`] event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    unit_price: Decimal,
    /// Visible to managers only; carried so sale lines can be checked against it.
    cost_basis: Decimal,
    stock_on_hand: i64,
    low_stock_threshold: i64,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            name: String::new(),
            unit_price: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            stock_on_hand: 0,
            low_stock_threshold: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn cost_basis(&self) -> Decimal {
        self.cost_basis
    }

    pub fn stock_on_hand(&self) -> i64 {
        self.stock_on_hand
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.low_stock_threshold
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }

    pub fn is_low_on_stock(&self) -> bool {
        self.stock_on_hand <= self.low_stock_threshold
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProduct {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub cost_basis: Decimal,
    pub low_stock_threshold: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdatePricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePricing {
    pub product_id: ProductId,
    pub unit_price: Decimal,
    pub cost_basis: Decimal,
    pub low_stock_threshold: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MoveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStock {
    pub product_id: ProductId,
    pub movement_id: MovementId,
    pub delta: i64,
    pub reason: MovementReason,
    pub tx_ref: TxRef,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    RegisterProduct(RegisterProduct),
    UpdatePricing(UpdatePricing),
    MoveStock(MoveStock),
}

/// Event: ProductRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRegistered {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub cost_basis: Decimal,
    pub low_stock_threshold: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PricingUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingUpdated {
    pub product_id: ProductId,
    pub unit_price: Decimal,
    pub cost_basis: Decimal,
    pub low_stock_threshold: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// An immutable signed change to a product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub movement_id: MovementId,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: MovementReason,
    pub tx_ref: TxRef,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
    /// Stored stock right after this movement was applied.
    pub stock_after: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductRegistered(ProductRegistered),
    PricingUpdated(PricingUpdated),
    StockMoved(InventoryMovement),
}

impl ProductEvent {
    pub fn as_movement(&self) -> Option<&InventoryMovement> {
        match self {
            ProductEvent::StockMoved(m) => Some(m),
            _ => None,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductRegistered(_) => "inventory.product.registered",
            ProductEvent::PricingUpdated(_) => "inventory.product.pricing_updated",
            ProductEvent::StockMoved(_) => "inventory.product.stock_moved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductRegistered(e) => e.occurred_at,
            ProductEvent::PricingUpdated(e) => e.occurred_at,
            ProductEvent::StockMoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductRegistered(e) => {
                self.id = e.product_id;
                self.name = e.name.clone();
                self.unit_price = e.unit_price;
                self.cost_basis = e.cost_basis;
                self.low_stock_threshold = e.low_stock_threshold;
                self.stock_on_hand = 0;
                self.created = true;
            }
            ProductEvent::PricingUpdated(e) => {
                self.unit_price = e.unit_price;
                self.cost_basis = e.cost_basis;
                self.low_stock_threshold = e.low_stock_threshold;
            }
            ProductEvent::StockMoved(e) => {
                self.stock_on_hand += e.delta;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::RegisterProduct(cmd) => self.handle_register(cmd),
            ProductCommand::UpdatePricing(cmd) => self.handle_update_pricing(cmd),
            ProductCommand::MoveStock(cmd) => self.handle_move(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        validate_pricing(cmd.unit_price, cmd.cost_basis, cmd.low_stock_threshold)?;

        Ok(vec![ProductEvent::ProductRegistered(ProductRegistered {
            product_id: cmd.product_id,
            name: cmd.name.trim().to_string(),
            unit_price: cmd.unit_price,
            cost_basis: cmd.cost_basis,
            low_stock_threshold: cmd.low_stock_threshold,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_pricing(&self, cmd: &UpdatePricing) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;
        validate_pricing(cmd.unit_price, cmd.cost_basis, cmd.low_stock_threshold)?;

        Ok(vec![ProductEvent::PricingUpdated(PricingUpdated {
            product_id: cmd.product_id,
            unit_price: cmd.unit_price,
            cost_basis: cmd.cost_basis,
            low_stock_threshold: cmd.low_stock_threshold,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_move(&self, cmd: &MoveStock) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        match cmd.reason {
            MovementReason::Sale if cmd.delta > 0 => {
                return Err(DomainError::validation("sale movements must remove stock"));
            }
            MovementReason::Restock if cmd.delta < 0 => {
                return Err(DomainError::validation("restock movements must add stock"));
            }
            _ => {}
        }
        if cmd.tx_ref.kind != cmd.reason.tx_kind() {
            return Err(DomainError::invariant(format!(
                "{:?} movement cannot reference {}",
                cmd.reason, cmd.tx_ref
            )));
        }

        let stock_after = self.stock_on_hand.checked_add(cmd.delta).ok_or_else(|| {
            DomainError::validation(format!(
                "moving {} units would overflow the stock of {}",
                cmd.delta, cmd.product_id
            ))
        })?;
        if stock_after < 0 {
            return Err(DomainError::InsufficientStock {
                product: cmd.product_id.aggregate_id(),
                available: self.stock_on_hand,
                requested: cmd.delta.saturating_neg(),
            });
        }

        Ok(vec![ProductEvent::StockMoved(InventoryMovement {
            movement_id: cmd.movement_id,
            product_id: cmd.product_id,
            delta: cmd.delta,
            reason: cmd.reason,
            tx_ref: cmd.tx_ref,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
            stock_after,
        })])
    }
}

fn validate_pricing(
    unit_price: Decimal,
    cost_basis: Decimal,
    low_stock_threshold: i64,
) -> Result<(), DomainError> {
    ensure_non_negative("unit_price", unit_price)?;
    ensure_non_negative("cost_basis", cost_basis)?;
    ensure_money_scale("unit_price", unit_price)?;
    ensure_money_scale("cost_basis", cost_basis)?;
    if low_stock_threshold < 0 {
        return Err(DomainError::validation("low_stock_threshold cannot be negative"));
    }
    Ok(())
}

/// Recompute a product's stock from its movement log.
///
/// CORRECTION movements are left out: they re-anchor the stored value and
/// are not part of the log they re-anchor it to.
pub fn recompute_stock<'a>(movements: impl IntoIterator<Item = &'a InventoryMovement>) -> i64 {
    movements
        .into_iter()
        .filter(|m| m.reason != MovementReason::Correction)
        .map(|m| m.delta)
        .sum()
}
