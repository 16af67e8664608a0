use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_auth::Actor;
use shopledger_core::{AggregateId, UserId, typed_id};

typed_id!(
    /// Audit record identifier.
    AuditRecordId
);

/// What kind of state change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ProductRegistered,
    PricingUpdated,
    InventoryRestocked,
    SaleCreated,
    DebtAdded,
    DebtPaid,
    CustomerAdded,
    CustomerStatusChanged,
    StockCorrected,
    DebtCorrected,
    DebtManuallyAdjusted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Product,
    Customer,
    Sale,
    Payment,
    Restock,
    Correction,
    DebtAdjustment,
}

/// The entity a record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub entity_id: AggregateId,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, entity_id: AggregateId) -> Self {
        Self {
            entity_type,
            entity_id,
        }
    }
}

/// A record waiting to be committed with the rest of its posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    pub actor_id: UserId,
    pub actor_name: String,
    pub action: AuditAction,
    pub entity: EntityRef,
    pub description: String,
    pub origin: Option<IpAddr>,
    pub occurred_at: DateTime<Utc>,
}

impl NewAuditRecord {
    pub fn new(
        actor: &Actor,
        action: AuditAction,
        entity: EntityRef,
        description: impl Into<String>,
        origin: Option<IpAddr>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            action,
            entity,
            description: description.into(),
            origin,
            occurred_at,
        }
    }

    /// Freeze the record at its position in the log.
    pub fn commit(self, id: AuditRecordId, sequence: u64) -> AuditRecord {
        AuditRecord {
            id,
            sequence,
            actor_id: self.actor_id,
            actor_name: self.actor_name,
            action: self.action,
            entity: self.entity,
            description: self.description,
            origin: self.origin,
            occurred_at: self.occurred_at,
        }
    }
}

/// A committed audit record.
///
/// `sequence` is global and gap-free; the records of one posting are
/// contiguous and in the order the posting staged them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub sequence: u64,
    pub actor_id: UserId,
    pub actor_name: String,
    pub action: AuditAction,
    pub entity: EntityRef,
    pub description: String,
    pub origin: Option<IpAddr>,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_serialize_as_screaming_tags() {
        let json = serde_json::to_string(&AuditAction::DebtPaid).unwrap();
        assert_eq!(json, r#""DEBT_PAID""#);
    }

    #[test]
    fn commit_keeps_actor_attribution() {
        let actor = Actor::system();
        let record = NewAuditRecord::new(
            &actor,
            AuditAction::StockCorrected,
            EntityRef::new(EntityType::Product, AggregateId::new()),
            "recorded 50, computed 47",
            Some("127.0.0.1".parse().unwrap()),
            Utc::now(),
        )
        .commit(AuditRecordId::generate(), 7);

        assert_eq!(record.sequence, 7);
        assert_eq!(record.actor_name, "system");
        assert_eq!(record.actor_id, UserId::nil());
    }
}
