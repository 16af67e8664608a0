use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_core::{DomainError, TxKind, TxRef, UserId, typed_id};
use shopledger_events::Event;

use crate::ProductId;

typed_id!(
    /// Identifier of a restock record.
    RestockId
);

/// Immutable record of stock received into inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restock {
    pub restock_id: RestockId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub note: Option<String>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl Restock {
    pub fn new(
        restock_id: RestockId,
        product_id: ProductId,
        quantity: i64,
        note: Option<String>,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::validation("restock quantity must be positive"));
        }
        Ok(Self {
            restock_id,
            product_id,
            quantity,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            actor,
            occurred_at,
        })
    }

    pub fn tx_ref(&self) -> TxRef {
        TxRef::new(TxKind::Restock, self.restock_id.aggregate_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestockEvent {
    RestockRecorded(Restock),
}

impl Event for RestockEvent {
    fn event_type(&self) -> &'static str {
        "inventory.restock.recorded"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RestockEvent::RestockRecorded(r) => r.occurred_at,
        }
    }
}
