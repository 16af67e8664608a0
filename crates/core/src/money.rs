//! Money helpers.
//!
//! Amounts are `rust_decimal::Decimal` values in the ledger's base currency,
//! kept to two decimal places.

use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Number of decimal places every ledger amount is held to.
pub const MONEY_SCALE: u32 = 2;

/// Round to the ledger scale, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject amounts carrying more precision than the ledger stores.
pub fn ensure_money_scale(field: &str, amount: Decimal) -> DomainResult<()> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(DomainError::validation(format!(
            "{field} has more than {MONEY_SCALE} decimal places: {amount}"
        )));
    }
    Ok(())
}

pub fn ensure_non_negative(field: &str, amount: Decimal) -> DomainResult<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

/// ISO-4217 style currency code (three ASCII uppercase letters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::validation(format!("invalid currency code: {s:?}")));
        }
        Ok(Self(code))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
    }

    #[test]
    fn scale_check_ignores_trailing_zeros() {
        assert!(ensure_money_scale("amount", dec!(10.500)).is_ok());
        assert!(ensure_money_scale("amount", dec!(10.505)).is_err());
    }

    #[test]
    fn currency_codes_are_normalised() {
        let code: CurrencyCode = " usd ".parse().unwrap();
        assert_eq!(code.as_str(), "USD");
        assert!("US".parse::<CurrencyCode>().is_err());
        assert!("U5D".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(ensure_non_negative("price", dec!(-0.01)).is_err());
        assert!(ensure_non_negative("price", Decimal::ZERO).is_ok());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: rounded amounts always pass the scale check.
            #[test]
            fn rounded_amounts_fit_the_ledger_scale(
                units in -1_000_000_000i64..1_000_000_000,
                scale in 0u32..8
            ) {
                let amount = Decimal::new(units, scale);
                prop_assert!(ensure_money_scale("amount", round_money(amount)).is_ok());
            }
        }
    }
}
