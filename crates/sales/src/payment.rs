use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopledger_core::{DomainError, TxKind, TxRef, UserId, ensure_money_scale, typed_id};
use shopledger_customers::CustomerId;
use shopledger_events::Event;

typed_id!(
    /// Payment identifier.
    PaymentId
);

/// Immutable record of a debt payment, in the base currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub customer_id: CustomerId,
    pub amount: Decimal,
    pub note: Option<String>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        payment_id: PaymentId,
        customer_id: CustomerId,
        amount: Decimal,
        note: Option<String>,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        ensure_money_scale("amount", amount)?;

        Ok(Self {
            payment_id,
            customer_id,
            amount,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            actor,
            occurred_at,
        })
    }

    pub fn tx_ref(&self) -> TxRef {
        TxRef::new(TxKind::Payment, self.payment_id.aggregate_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEvent {
    PaymentRecorded(Payment),
}

impl Event for PaymentEvent {
    fn event_type(&self) -> &'static str {
        "sales.payment.recorded"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentEvent::PaymentRecorded(p) => p.occurred_at,
        }
    }
}
