use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopledger_core::CurrencyCode;
use shopledger_customers::CustomerId;
use shopledger_inventory::{Product, ProductId};

use crate::{PaymentId, SaleId};

/// Stock of one product right after a posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub name: String,
    pub stock_on_hand: i64,
    pub low_stock: bool,
}

impl From<&Product> for StockLevel {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id_typed(),
            name: product.name().to_string(),
            stock_on_hand: product.stock_on_hand(),
            low_stock: product.is_low_on_stock(),
        }
    }
}

/// Returned by a successful sale posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale_id: SaleId,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub debt_portion: Decimal,
    pub overpayment: Decimal,
    pub currency: CurrencyCode,
    pub total_in_currency: Decimal,
    pub stock_levels: Vec<StockLevel>,
    pub customer_id: Option<CustomerId>,
    pub customer_balance: Option<Decimal>,
}

/// Returned by a successful payment posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment_id: PaymentId,
    pub customer_id: CustomerId,
    pub amount: Decimal,
    pub balance: Decimal,
}
