use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "sales.post"). The wildcard `"*"`
/// grants everything and is what the system actor carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// Post sales, record payments, register customers.
    pub const SELL: Permission = Permission(Cow::Borrowed("sales.post"));
    /// Receive stock into inventory.
    pub const RESTOCK: Permission = Permission(Cow::Borrowed("inventory.restock"));
    /// Register products and change their pricing.
    pub const MANAGE_CATALOG: Permission = Permission(Cow::Borrowed("catalog.manage"));
    /// Run reconciliation (verify and repair).
    pub const RECONCILE: Permission = Permission(Cow::Borrowed("ledger.reconcile"));
    /// Set a customer's debt by hand.
    pub const ADJUST_DEBT: Permission = Permission(Cow::Borrowed("customers.adjust_debt"));
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
