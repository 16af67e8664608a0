use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopledger_core::{
    CurrencyCode, DomainError, TxKind, TxRef, UserId, ensure_money_scale, ensure_non_negative,
    round_money, typed_id,
};
use shopledger_customers::CustomerId;
use shopledger_events::Event;
use shopledger_inventory::{Product, ProductId};

typed_id!(
    /// Sale identifier.
    SaleId
);

/// One requested line, resolved against the committed catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput<'a> {
    pub product: &'a Product,
    pub quantity: i64,
    /// Negotiated price; must not be below the product's cost basis.
    pub unit_price_override: Option<Decimal>,
}

/// Sale line as posted (price frozen at time of sale).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// How the customer paid: the tender currency and the rate in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tender {
    pub currency: CurrencyCode,
    /// Units of `currency` per base-currency unit (1 for the base currency).
    pub exchange_rate: Decimal,
    /// Amount handed over, in `currency`.
    pub amount_tendered: Decimal,
    /// Sale total expressed in `currency`.
    pub total_in_currency: Decimal,
}

/// Immutable sale record. All amounts are in the base currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub sale_id: SaleId,
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<SaleLine>,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub debt_portion: Decimal,
    /// Paid beyond the total; recorded, never turned into credit.
    pub overpayment: Decimal,
    pub tender: Tender,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// `max(0, total - paid)`.
pub fn debt_portion(total: Decimal, paid: Decimal) -> Decimal {
    (total - paid).max(Decimal::ZERO)
}

impl Sale {
    /// Price a sale from committed catalog values.
    ///
    /// `amount_paid` is already converted to the base currency. Fails before
    /// anything is posted if a line is malformed or a credit sale has no
    /// customer attached.
    #[allow(clippy::too_many_arguments)]
    pub fn price(
        sale_id: SaleId,
        customer_id: Option<CustomerId>,
        lines: &[LineInput<'_>],
        amount_paid: Decimal,
        currency: CurrencyCode,
        exchange_rate: Decimal,
        amount_tendered: Decimal,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation("a sale needs at least one line"));
        }
        ensure_non_negative("amount_paid", amount_paid)?;
        ensure_money_scale("amount_paid", amount_paid)?;
        if exchange_rate <= Decimal::ZERO {
            return Err(DomainError::validation("exchange rate must be positive"));
        }

        let mut priced = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            priced.push(price_line(idx as u32 + 1, line)?);
        }
        ensure_quantities_fit(&priced)?;

        let total_amount = priced
            .iter()
            .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.line_total))
            .ok_or_else(|| DomainError::validation("sale total is out of range"))?;
        let total_in_currency = total_amount
            .checked_mul(exchange_rate)
            .map(round_money)
            .ok_or_else(|| {
                DomainError::validation("sale total in tender currency is out of range")
            })?;
        let debt = debt_portion(total_amount, amount_paid);
        let overpayment = (amount_paid - total_amount).max(Decimal::ZERO);

        if debt > Decimal::ZERO && customer_id.is_none() {
            return Err(DomainError::validation(format!(
                "sale leaves {debt} unpaid but has no customer to carry the debt"
            )));
        }

        Ok(Self {
            sale_id,
            customer_id,
            lines: priced,
            total_amount,
            amount_paid,
            debt_portion: debt,
            overpayment,
            tender: Tender {
                currency,
                exchange_rate,
                amount_tendered,
                total_in_currency,
            },
            actor,
            occurred_at,
        })
    }

    pub fn tx_ref(&self) -> TxRef {
        TxRef::new(TxKind::Sale, self.sale_id.aggregate_id())
    }

    /// Total units sold per product, in ascending product order.
    pub fn quantities_by_product(&self) -> Vec<(ProductId, i64)> {
        merge_quantities(&self.lines).unwrap_or_default()
    }

    /// Whether the stored totals agree with the lines and the payment.
    pub fn totals_consistent(&self) -> bool {
        let lines_ok = self.lines.iter().all(|l| {
            l.unit_price.checked_mul(Decimal::from(l.quantity)) == Some(l.line_total)
        });
        let total = self
            .lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.line_total));
        lines_ok
            && total == Some(self.total_amount)
            && self.debt_portion == debt_portion(self.total_amount, self.amount_paid)
    }
}

/// Per-product quantity sums; `None` if one of them leaves `i64`.
fn merge_quantities(lines: &[SaleLine]) -> Option<Vec<(ProductId, i64)>> {
    let mut out: Vec<(ProductId, i64)> = Vec::new();
    for line in lines {
        match out.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty = qty.checked_add(line.quantity)?,
            None => out.push((line.product_id, line.quantity)),
        }
    }
    out.sort_by_key(|(id, _)| *id);
    Some(out)
}

fn ensure_quantities_fit(lines: &[SaleLine]) -> Result<(), DomainError> {
    merge_quantities(lines)
        .map(|_| ())
        .ok_or_else(|| DomainError::validation("combined quantity for a product is out of range"))
}

fn price_line(line_no: u32, line: &LineInput<'_>) -> Result<SaleLine, DomainError> {
    let product = line.product;
    if !product.is_registered() {
        return Err(DomainError::validation(format!(
            "unknown product {}",
            product.id_typed()
        )));
    }
    if line.quantity <= 0 {
        return Err(DomainError::validation(format!(
            "line {line_no}: quantity must be positive"
        )));
    }

    let unit_price = match line.unit_price_override {
        Some(price) => {
            ensure_money_scale("unit_price", price)?;
            if price < product.cost_basis() {
                return Err(DomainError::validation(format!(
                    "line {line_no}: price {price} is below cost for {}",
                    product.name()
                )));
            }
            price
        }
        None => product.unit_price(),
    };

    let line_total = unit_price
        .checked_mul(Decimal::from(line.quantity))
        .ok_or_else(|| {
            DomainError::validation(format!("line {line_no}: line total is out of range"))
        })?;

    Ok(SaleLine {
        line_no,
        product_id: product.id_typed(),
        product_name: product.name().to_string(),
        quantity: line.quantity,
        unit_price,
        line_total,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SalePosted(Sale),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        "sales.sale.posted"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SalePosted(s) => s.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use shopledger_core::{Aggregate, MovementId};
    use shopledger_inventory::{MoveStock, MovementReason, ProductCommand, RegisterProduct};

    fn usd() -> CurrencyCode {
        "USD".parse().unwrap()
    }

    fn product(price: Decimal, cost: Decimal, stock: i64) -> Product {
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        product
            .execute(&ProductCommand::RegisterProduct(RegisterProduct {
                product_id,
                name: "Charger".to_string(),
                unit_price: price,
                cost_basis: cost,
                low_stock_threshold: 2,
                actor: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        if stock > 0 {
            product
                .execute(&ProductCommand::MoveStock(MoveStock {
                    product_id,
                    movement_id: MovementId::generate(),
                    delta: stock,
                    reason: MovementReason::Restock,
                    tx_ref: TxRef::new(TxKind::Restock, shopledger_core::AggregateId::new()),
                    actor: UserId::new(),
                    occurred_at: Utc::now(),
                }))
                .unwrap();
        }
        product
    }

    fn price(
        customer: Option<CustomerId>,
        lines: &[LineInput<'_>],
        paid: Decimal,
    ) -> Result<Sale, DomainError> {
        Sale::price(
            SaleId::generate(),
            customer,
            lines,
            paid,
            usd(),
            Decimal::ONE,
            paid,
            UserId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn fully_paid_sale_has_no_debt() {
        let p = product(dec!(25), dec!(10), 10);
        let sale = price(
            None,
            &[LineInput { product: &p, quantity: 4, unit_price_override: None }],
            dec!(100),
        )
        .unwrap();
        assert_eq!(sale.total_amount, dec!(100));
        assert_eq!(sale.debt_portion, Decimal::ZERO);
        assert_eq!(sale.overpayment, Decimal::ZERO);
        assert!(sale.totals_consistent());
    }

    #[test]
    fn partial_payment_carries_debt_to_customer() {
        let p = product(dec!(50), dec!(30), 10);
        let customer = CustomerId::generate();
        let sale = price(
            Some(customer),
            &[LineInput { product: &p, quantity: 2, unit_price_override: None }],
            dec!(40),
        )
        .unwrap();
        assert_eq!(sale.total_amount, dec!(100));
        assert_eq!(sale.debt_portion, dec!(60));
    }

    #[test]
    fn credit_sale_without_customer_is_rejected() {
        let p = product(dec!(50), dec!(30), 10);
        let err = price(
            None,
            &[LineInput { product: &p, quantity: 1, unit_price_override: None }],
            dec!(10),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn overpayment_is_recorded_separately() {
        let p = product(dec!(9.99), dec!(5), 10);
        let sale = price(
            None,
            &[LineInput { product: &p, quantity: 1, unit_price_override: None }],
            dec!(10),
        )
        .unwrap();
        assert_eq!(sale.debt_portion, Decimal::ZERO);
        assert_eq!(sale.overpayment, dec!(0.01));
    }

    #[test]
    fn override_below_cost_is_rejected() {
        let p = product(dec!(20), dec!(12), 10);
        let err = price(
            None,
            &[LineInput { product: &p, quantity: 1, unit_price_override: Some(dec!(11.99)) }],
            dec!(20),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let sale = price(
            None,
            &[LineInput { product: &p, quantity: 1, unit_price_override: Some(dec!(12)) }],
            dec!(12),
        )
        .unwrap();
        assert_eq!(sale.lines[0].unit_price, dec!(12));
    }

    #[test]
    fn zero_quantity_and_negative_payment_are_rejected() {
        let p = product(dec!(20), dec!(12), 10);
        assert!(price(
            None,
            &[LineInput { product: &p, quantity: 0, unit_price_override: None }],
            dec!(0),
        )
        .is_err());
        assert!(price(
            None,
            &[LineInput { product: &p, quantity: 1, unit_price_override: None }],
            dec!(-1),
        )
        .is_err());
        assert!(price(None, &[], dec!(0)).is_err());
    }

    #[test]
    fn unregistered_product_is_a_validation_error() {
        let ghost = Product::empty(ProductId::generate());
        let err = price(
            None,
            &[LineInput { product: &ghost, quantity: 1, unit_price_override: None }],
            dec!(0),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn tender_total_uses_exchange_rate() {
        let p = product(dec!(3.50), dec!(1), 10);
        let sale = Sale::price(
            SaleId::generate(),
            None,
            &[LineInput { product: &p, quantity: 2, unit_price_override: None }],
            dec!(7),
            "SOS".parse().unwrap(),
            dec!(570),
            dec!(3990),
            UserId::new(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(sale.tender.total_in_currency, dec!(3990));
    }

    #[test]
    fn totals_beyond_decimal_range_are_validation_errors() {
        let pricey = product(dec!(99999999999), dec!(1), 0);
        let err = price(
            None,
            &[LineInput { product: &pricey, quantity: i64::MAX, unit_price_override: None }],
            dec!(0),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        // Each line fits; their sum does not.
        let huge = product(dec!(40000000000000000000000000000), dec!(1), 0);
        let err = price(
            Some(CustomerId::generate()),
            &[
                LineInput { product: &huge, quantity: 1, unit_price_override: None },
                LineInput { product: &huge, quantity: 1, unit_price_override: None },
            ],
            dec!(0),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn repeated_lines_whose_quantities_overflow_are_rejected() {
        let p = product(dec!(0), dec!(0), 0);
        let err = price(
            None,
            &[
                LineInput { product: &p, quantity: i64::MAX, unit_price_override: None },
                LineInput { product: &p, quantity: 1, unit_price_override: None },
            ],
            dec!(0),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn tender_conversion_beyond_decimal_range_is_rejected() {
        let p = product(dec!(1000000000000000000000000000), dec!(1), 0);
        let err = Sale::price(
            SaleId::generate(),
            None,
            &[LineInput { product: &p, quantity: 1, unit_price_override: None }],
            dec!(1000000000000000000000000000),
            "SOS".parse().unwrap(),
            dec!(570),
            dec!(0),
            UserId::new(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn quantities_are_merged_per_product() {
        let a = product(dec!(1), dec!(1), 10);
        let b = product(dec!(2), dec!(1), 10);
        let sale = price(
            None,
            &[
                LineInput { product: &a, quantity: 1, unit_price_override: None },
                LineInput { product: &b, quantity: 2, unit_price_override: None },
                LineInput { product: &a, quantity: 3, unit_price_override: None },
            ],
            dec!(8),
        )
        .unwrap();
        let merged = sale.quantities_by_product();
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&(a.id_typed(), 4)));
        assert!(merged.contains(&(b.id_typed(), 2)));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: totals and the debt split are always consistent,
            /// and debt + paid covers the total exactly unless overpaid.
            #[test]
            fn priced_sales_are_internally_consistent(
                price_cents in 0i64..100_000,
                quantity in 1i64..50,
                paid_cents in 0i64..10_000_000,
            ) {
                let p = product(Decimal::new(price_cents, 2), Decimal::ZERO, 0);
                let sale = price(
                    Some(CustomerId::generate()),
                    &[LineInput { product: &p, quantity, unit_price_override: None }],
                    Decimal::new(paid_cents, 2),
                ).unwrap();

                prop_assert!(sale.totals_consistent());
                prop_assert!(sale.debt_portion >= Decimal::ZERO);
                prop_assert_eq!(
                    sale.amount_paid - sale.overpayment + sale.debt_portion,
                    sale.total_amount
                );
            }
        }
    }
}
