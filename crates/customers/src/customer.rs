use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopledger_core::{
    Aggregate, AggregateRoot, DomainError, MovementId, TxKind, TxRef, UserId, ensure_money_scale,
    typed_id,
};
use shopledger_events::Event;

typed_id!(
    /// Customer identifier.
    CustomerId
);

/// Why a customer's debt moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtReason {
    /// Unpaid portion of a sale (positive).
    Sale,
    /// Payment applied against the balance (negative).
    Payment,
    /// Reconciliation re-anchoring the stored value to the movement log.
    Correction,
    /// Manual correction by a manager, either sign. Part of the log, unlike
    /// `Correction`.
    Adjustment,
}

impl DebtReason {
    pub fn tx_kind(self) -> TxKind {
        match self {
            DebtReason::Sale => TxKind::Sale,
            DebtReason::Payment => TxKind::Payment,
            DebtReason::Correction => TxKind::Correction,
            DebtReason::Adjustment => TxKind::DebtAdjustment,
        }
    }
}

/// Contact information for a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Aggregate root: Customer.
///
/// `outstanding_debt` is the stored ledger balance, held in the base currency.
/// It is never negative and changes only through [`CustomerEvent::DebtMoved`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    id: CustomerId,
    name: String,
    contact: ContactInfo,
    outstanding_debt: Decimal,
    active: bool,
    version: u64,
    created: bool,
}

impl Customer {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: CustomerId) -> Self {
        Self {
            id,
            name: String::new(),
            contact: ContactInfo::default(),
            outstanding_debt: Decimal::ZERO,
            active: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn outstanding_debt(&self) -> Decimal {
        self.outstanding_debt
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterCustomer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCustomer {
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactInfo,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetCustomerActive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCustomerActive {
    pub customer_id: CustomerId,
    pub active: bool,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MoveDebt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDebt {
    pub customer_id: CustomerId,
    pub movement_id: MovementId,
    pub delta: Decimal,
    pub reason: DebtReason,
    pub tx_ref: TxRef,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerCommand {
    RegisterCustomer(RegisterCustomer),
    SetCustomerActive(SetCustomerActive),
    MoveDebt(MoveDebt),
}

/// Event: CustomerRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRegistered {
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactInfo,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustomerStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerStatusChanged {
    pub customer_id: CustomerId,
    pub active: bool,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// An immutable signed change to a customer's debt
/// (positive = debt incurred, negative = payment applied).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtMovement {
    pub movement_id: MovementId,
    pub customer_id: CustomerId,
    pub delta: Decimal,
    pub reason: DebtReason,
    pub tx_ref: TxRef,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
    pub balance_after: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerEvent {
    CustomerRegistered(CustomerRegistered),
    CustomerStatusChanged(CustomerStatusChanged),
    DebtMoved(DebtMovement),
}

impl CustomerEvent {
    pub fn as_movement(&self) -> Option<&DebtMovement> {
        match self {
            CustomerEvent::DebtMoved(m) => Some(m),
            _ => None,
        }
    }
}

impl Event for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::CustomerRegistered(_) => "customers.customer.registered",
            CustomerEvent::CustomerStatusChanged(_) => "customers.customer.status_changed",
            CustomerEvent::DebtMoved(_) => "customers.customer.debt_moved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomerEvent::CustomerRegistered(e) => e.occurred_at,
            CustomerEvent::CustomerStatusChanged(e) => e.occurred_at,
            CustomerEvent::DebtMoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Customer {
    type Command = CustomerCommand;
    type Event = CustomerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustomerEvent::CustomerRegistered(e) => {
                self.id = e.customer_id;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.outstanding_debt = Decimal::ZERO;
                self.active = true;
                self.created = true;
            }
            CustomerEvent::CustomerStatusChanged(e) => {
                self.active = e.active;
            }
            CustomerEvent::DebtMoved(e) => {
                self.outstanding_debt += e.delta;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustomerCommand::RegisterCustomer(cmd) => self.handle_register(cmd),
            CustomerCommand::SetCustomerActive(cmd) => self.handle_set_active(cmd),
            CustomerCommand::MoveDebt(cmd) => self.handle_move(cmd),
        }
    }
}

impl Customer {
    fn ensure_customer_id(&self, customer_id: CustomerId) -> Result<(), DomainError> {
        if self.id != customer_id {
            return Err(DomainError::invariant("customer_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterCustomer) -> Result<Vec<CustomerEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("customer already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if let Some(email) = &cmd.contact.email {
            if !email.contains('@') {
                return Err(DomainError::validation("email must contain '@'"));
            }
        }

        Ok(vec![CustomerEvent::CustomerRegistered(CustomerRegistered {
            customer_id: cmd.customer_id,
            name: cmd.name.trim().to_string(),
            contact: cmd.contact.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_active(
        &self,
        cmd: &SetCustomerActive,
    ) -> Result<Vec<CustomerEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_customer_id(cmd.customer_id)?;
        if self.active == cmd.active {
            return Ok(vec![]);
        }

        Ok(vec![CustomerEvent::CustomerStatusChanged(CustomerStatusChanged {
            customer_id: cmd.customer_id,
            active: cmd.active,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_move(&self, cmd: &MoveDebt) -> Result<Vec<CustomerEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_customer_id(cmd.customer_id)?;

        if cmd.delta.is_zero() {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        ensure_money_scale("delta", cmd.delta)?;
        match cmd.reason {
            DebtReason::Sale if cmd.delta.is_sign_negative() => {
                return Err(DomainError::validation("sale debt movements must add debt"));
            }
            DebtReason::Payment if cmd.delta.is_sign_positive() => {
                return Err(DomainError::validation("payment movements must reduce debt"));
            }
            _ => {}
        }
        if cmd.tx_ref.kind != cmd.reason.tx_kind() {
            return Err(DomainError::invariant(format!(
                "{:?} movement cannot reference {}",
                cmd.reason, cmd.tx_ref
            )));
        }

        // Rejected, never clamped.
        let balance_after = self.outstanding_debt.checked_add(cmd.delta).ok_or_else(|| {
            DomainError::validation(format!(
                "moving {} would overflow the debt of {}",
                cmd.delta, cmd.customer_id
            ))
        })?;
        if balance_after.is_sign_negative() && !balance_after.is_zero() {
            return Err(DomainError::DebtWouldGoNegative {
                customer: cmd.customer_id.aggregate_id(),
                balance: self.outstanding_debt,
                delta: cmd.delta,
            });
        }

        Ok(vec![CustomerEvent::DebtMoved(DebtMovement {
            movement_id: cmd.movement_id,
            customer_id: cmd.customer_id,
            delta: cmd.delta,
            reason: cmd.reason,
            tx_ref: cmd.tx_ref,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
            balance_after,
        })])
    }
}

/// Recompute a customer's debt from its movement log, leaving out
/// CORRECTION movements.
pub fn recompute_debt<'a>(movements: impl IntoIterator<Item = &'a DebtMovement>) -> Decimal {
    movements
        .into_iter()
        .filter(|m| m.reason != DebtReason::Correction)
        .map(|m| m.delta)
        .sum()
}
