use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopledger_core::{
    DomainError, TxKind, TxRef, UserId, ensure_money_scale, ensure_non_negative, typed_id,
};
use shopledger_events::Event;

use crate::CustomerId;

typed_id!(
    /// Identifier of a manual debt adjustment.
    DebtAdjustmentId
);

/// Immutable record of a manager setting a customer's debt by hand.
///
/// The ADJUSTMENT movement it backs is part of the movement log, so the
/// new balance survives reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtAdjustment {
    pub adjustment_id: DebtAdjustmentId,
    pub customer_id: CustomerId,
    pub old_balance: Decimal,
    pub new_balance: Decimal,
    /// `new_balance - old_balance`.
    pub adjustment: Decimal,
    pub reason: String,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl DebtAdjustment {
    pub fn new(
        adjustment_id: DebtAdjustmentId,
        customer_id: CustomerId,
        old_balance: Decimal,
        new_balance: Decimal,
        reason: impl Into<String>,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        ensure_non_negative("new_balance", new_balance)?;
        ensure_money_scale("new_balance", new_balance)?;
        let reason = reason.into().trim().to_string();
        if reason.is_empty() {
            return Err(DomainError::validation("a debt adjustment needs a reason"));
        }
        let adjustment = new_balance
            .checked_sub(old_balance)
            .ok_or_else(|| DomainError::validation("debt adjustment is out of range"))?;
        if adjustment.is_zero() {
            return Err(DomainError::validation(format!("debt is already {old_balance}")));
        }

        Ok(Self {
            adjustment_id,
            customer_id,
            old_balance,
            new_balance,
            adjustment,
            reason,
            actor,
            occurred_at,
        })
    }

    pub fn tx_ref(&self) -> TxRef {
        TxRef::new(TxKind::DebtAdjustment, self.adjustment_id.aggregate_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebtAdjustmentEvent {
    DebtAdjusted(DebtAdjustment),
}

impl Event for DebtAdjustmentEvent {
    fn event_type(&self) -> &'static str {
        "customers.debt_adjustment.recorded"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DebtAdjustmentEvent::DebtAdjusted(a) => a.occurred_at,
        }
    }
}
