use std::net::IpAddr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopledger_core::CurrencyCode;
use shopledger_customers::{ContactInfo, Customer, CustomerId, DebtAdjustmentId, DebtMovement};
use shopledger_inventory::{InventoryMovement, Product, ProductId, RestockId};

use crate::query::Page;

// -------------------------
// Postings
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Overrides the catalog price for this line; may not be below cost.
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<SaleLineRequest>,
    /// In `currency`.
    pub amount_paid: Decimal,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub origin: Option<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub customer_id: CustomerId,
    /// Base currency.
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub origin: Option<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub origin: Option<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockReceipt {
    pub restock_id: RestockId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub stock_on_hand: i64,
    pub low_stock: bool,
}

/// Set a customer's debt by hand. Amounts are in the base currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtAdjustmentRequest {
    pub customer_id: CustomerId,
    pub new_balance: Decimal,
    pub reason: String,
    #[serde(default)]
    pub origin: Option<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtAdjustmentReceipt {
    pub adjustment_id: DebtAdjustmentId,
    pub customer_id: CustomerId,
    pub old_balance: Decimal,
    pub new_balance: Decimal,
    pub adjustment: Decimal,
}

// -------------------------
// Catalog and customers
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProductRequest {
    pub name: String,
    pub unit_price: Decimal,
    pub cost_basis: Decimal,
    #[serde(default)]
    pub low_stock_threshold: i64,
    /// Posted as a restock when positive.
    #[serde(default)]
    pub opening_stock: i64,
    #[serde(default)]
    pub origin: Option<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePricingRequest {
    pub product_id: ProductId,
    pub unit_price: Decimal,
    pub cost_basis: Decimal,
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub origin: Option<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub origin: Option<IpAddr>,
}

// -------------------------
// Ledger state
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLedgerState {
    pub product: Product,
    pub stock_on_hand: i64,
    pub low_stock: bool,
    pub movements: Page<InventoryMovement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerLedgerState {
    pub customer: Customer,
    pub outstanding_debt: Decimal,
    pub movements: Page<DebtMovement>,
}
