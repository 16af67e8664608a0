use serde::{Deserialize, Serialize};

use shopledger_core::UserId;

use crate::Permission;

/// The authenticated staff member performing an operation.
///
/// Passed explicitly into every mutating call and recorded on every movement
/// and audit record it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    pub permissions: Vec<Permission>,
}

impl Actor {
    pub fn new(id: UserId, name: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            id,
            name: name.into(),
            permissions,
        }
    }

    /// Internal actor used for startup reconciliation.
    pub fn system() -> Self {
        Self::new(UserId::nil(), "system", vec![Permission::WILDCARD])
    }

    pub fn has(&self, permission: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == permission)
    }

    pub fn can_sell(&self) -> bool {
        self.has(&Permission::SELL)
    }

    pub fn can_restock(&self) -> bool {
        self.has(&Permission::RESTOCK)
    }
}
