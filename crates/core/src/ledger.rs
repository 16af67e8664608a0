//! Vocabulary shared by the product and customer ledgers.

use serde::{Deserialize, Serialize};

use crate::id::AggregateId;

crate::typed_id!(
    /// Identifier of a single inventory or debt movement.
    MovementId
);

/// The kind of immutable record a movement was posted for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxKind {
    Sale,
    Payment,
    Restock,
    Correction,
    DebtAdjustment,
}

impl TxKind {
    /// Stream type of the record this kind refers to.
    pub fn stream_type(self) -> &'static str {
        match self {
            TxKind::Sale => "sales.sale",
            TxKind::Payment => "sales.payment",
            TxKind::Restock => "inventory.restock",
            TxKind::Correction => "ledger.correction",
            TxKind::DebtAdjustment => "customers.debt_adjustment",
        }
    }
}

/// Reference from a movement to the transaction record that created it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxRef {
    pub kind: TxKind,
    pub id: AggregateId,
}

impl TxRef {
    pub fn new(kind: TxKind, id: AggregateId) -> Self {
        Self { kind, id }
    }
}

impl core::fmt::Display for TxRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.kind.stream_type(), self.id)
    }
}
