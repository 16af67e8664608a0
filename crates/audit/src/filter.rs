use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuditAction, AuditRecord, EntityRef, EntityType};

/// Criteria for a sequential audit scan. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub entity_type: Option<EntityType>,
    pub entity: Option<EntityRef>,
    pub action: Option<AuditAction>,
    /// Inclusive.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive.
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn for_entity(entity: EntityRef) -> Self {
        Self {
            entity: Some(entity),
            ..Self::default()
        }
    }

    pub fn between(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            until: Some(until),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.entity_type
            .is_none_or(|t| record.entity.entity_type == t)
            && self.entity.is_none_or(|e| record.entity == e)
            && self.action.is_none_or(|a| record.action == a)
            && self.since.is_none_or(|s| record.occurred_at >= s)
            && self.until.is_none_or(|u| record.occurred_at < u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shopledger_auth::Actor;
    use shopledger_core::AggregateId;

    use crate::{AuditRecordId, NewAuditRecord};

    fn record(entity: EntityRef, action: AuditAction, at: DateTime<Utc>) -> AuditRecord {
        NewAuditRecord::new(&Actor::system(), action, entity, "test", None, at)
            .commit(AuditRecordId::generate(), 1)
    }

    #[test]
    fn empty_filter_matches_everything() {
        let r = record(
            EntityRef::new(EntityType::Sale, AggregateId::new()),
            AuditAction::SaleCreated,
            Utc::now(),
        );
        assert!(AuditFilter::default().matches(&r));
    }

    #[test]
    fn entity_filter_matches_only_that_entity() {
        let entity = EntityRef::new(EntityType::Customer, AggregateId::new());
        let other = EntityRef::new(EntityType::Customer, AggregateId::new());
        let filter = AuditFilter::for_entity(entity);
        assert!(filter.matches(&record(entity, AuditAction::DebtAdded, Utc::now())));
        assert!(!filter.matches(&record(other, AuditAction::DebtAdded, Utc::now())));
    }

    #[test]
    fn time_range_is_half_open() {
        let start = Utc::now();
        let end = start + Duration::minutes(5);
        let filter = AuditFilter::between(start, end);
        let entity = EntityRef::new(EntityType::Product, AggregateId::new());

        assert!(filter.matches(&record(entity, AuditAction::InventoryRestocked, start)));
        assert!(!filter.matches(&record(entity, AuditAction::InventoryRestocked, end)));
        assert!(!filter.matches(&record(
            entity,
            AuditAction::InventoryRestocked,
            start - Duration::seconds(1)
        )));
    }
}
