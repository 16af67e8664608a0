use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopledger_audit::{AuditAction, AuditFilter, EntityRef, EntityType};
use shopledger_core::{AggregateId, CurrencyCode};
use shopledger_customers::{ContactInfo, CustomerId};
use shopledger_infra::coordinator::{
    DebtAdjustmentRequest, PaymentRequest, RegisterCustomerRequest, RegisterProductRequest,
    RestockRequest, SaleLineRequest, SaleRequest, UpdatePricingRequest,
};
use shopledger_infra::{Pagination, ReconcileMode, ReconcileScope};
use shopledger_inventory::ProductId;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct PostSaleBody {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<SaleLineRequest>,
    pub amount_paid: Decimal,
    /// Defaults to the base currency.
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

impl PostSaleBody {
    pub fn into_request(self, base_currency: CurrencyCode, origin: Option<IpAddr>) -> SaleRequest {
        SaleRequest {
            customer_id: self.customer_id,
            lines: self.lines,
            amount_paid: self.amount_paid,
            currency: self.currency.unwrap_or(base_currency),
            origin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostPaymentBody {
    pub customer_id: CustomerId,
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

impl PostPaymentBody {
    pub fn into_request(self, origin: Option<IpAddr>) -> PaymentRequest {
        PaymentRequest {
            customer_id: self.customer_id,
            amount: self.amount,
            note: self.note,
            origin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterProductBody {
    pub name: String,
    pub unit_price: Decimal,
    pub cost_basis: Decimal,
    #[serde(default)]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub opening_stock: i64,
}

impl RegisterProductBody {
    pub fn into_request(self, origin: Option<IpAddr>) -> RegisterProductRequest {
        RegisterProductRequest {
            name: self.name,
            unit_price: self.unit_price,
            cost_basis: self.cost_basis,
            low_stock_threshold: self.low_stock_threshold,
            opening_stock: self.opening_stock,
            origin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePricingBody {
    pub unit_price: Decimal,
    pub cost_basis: Decimal,
    pub low_stock_threshold: i64,
}

impl UpdatePricingBody {
    pub fn into_request(
        self,
        product_id: ProductId,
        origin: Option<IpAddr>,
    ) -> UpdatePricingRequest {
        UpdatePricingRequest {
            product_id,
            unit_price: self.unit_price,
            cost_basis: self.cost_basis,
            low_stock_threshold: self.low_stock_threshold,
            origin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RestockBody {
    pub quantity: i64,
    #[serde(default)]
    pub note: Option<String>,
}

impl RestockBody {
    pub fn into_request(self, product_id: ProductId, origin: Option<IpAddr>) -> RestockRequest {
        RestockRequest {
            product_id,
            quantity: self.quantity,
            note: self.note,
            origin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterCustomerBody {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl RegisterCustomerBody {
    pub fn into_request(self, origin: Option<IpAddr>) -> RegisterCustomerRequest {
        RegisterCustomerRequest {
            name: self.name,
            contact: ContactInfo {
                phone: self.phone,
                email: self.email,
            },
            origin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetActiveBody {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct DebtAdjustmentBody {
    pub new_balance: Decimal,
    pub reason: String,
}

impl DebtAdjustmentBody {
    pub fn into_request(
        self,
        customer_id: CustomerId,
        origin: Option<IpAddr>,
    ) -> DebtAdjustmentRequest {
        DebtAdjustmentRequest {
            customer_id,
            new_balance: self.new_balance,
            reason: self.reason,
            origin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReconcileBody {
    pub mode: ReconcileMode,
    /// Defaults to every ledger.
    #[serde(default)]
    pub scope: Option<ReconcileScope>,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeRateBody {
    pub rate: Decimal,
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<AggregateId>,
    pub action: Option<AuditAction>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AuditQuery {
    /// An entity id only makes sense together with its type.
    pub fn filter(&self) -> Result<AuditFilter, &'static str> {
        let entity = match (self.entity_type, self.entity_id) {
            (Some(t), Some(id)) => Some(EntityRef::new(t, id)),
            (_, None) => None,
            (None, Some(_)) => return Err("entity_id requires entity_type"),
        };
        Ok(AuditFilter {
            entity_type: self.entity_type,
            entity,
            action: self.action,
            since: self.since,
            until: self.until,
        })
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ExchangeRateView {
    pub base: CurrencyCode,
    pub local: CurrencyCode,
    pub rate: Decimal,
}
