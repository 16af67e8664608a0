//! Base/local currency exchange rate.

use std::sync::{PoisonError, RwLock};

use rust_decimal::Decimal;

use shopledger_core::{CurrencyCode, ensure_money_scale, round_money};

use crate::error::{LedgerError, LedgerResult};

/// The single rate between the base currency and the one local currency,
/// expressed as local units per base unit.
#[derive(Debug)]
pub struct ExchangeRateBook {
    base: CurrencyCode,
    local: CurrencyCode,
    rate: RwLock<Decimal>,
}

impl ExchangeRateBook {
    pub fn new(base: CurrencyCode, local: CurrencyCode, rate: Decimal) -> LedgerResult<Self> {
        ensure_positive(rate)?;
        Ok(Self {
            base,
            local,
            rate: RwLock::new(rate),
        })
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    pub fn local(&self) -> &CurrencyCode {
        &self.local
    }

    pub fn rate(&self) -> Decimal {
        *self.rate.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_rate(&self, rate: Decimal) -> LedgerResult<()> {
        ensure_positive(rate)?;
        *self.rate.write().unwrap_or_else(PoisonError::into_inner) = rate;
        tracing::info!(%rate, base = %self.base, local = %self.local, "exchange rate updated");
        Ok(())
    }

    /// Rate to apply to an amount tendered in `currency` (1 for the base).
    pub fn rate_for(&self, currency: &CurrencyCode) -> LedgerResult<Decimal> {
        if *currency == self.base {
            Ok(Decimal::ONE)
        } else if *currency == self.local {
            Ok(self.rate())
        } else {
            Err(LedgerError::validation(format!(
                "unsupported currency {currency}: expected {} or {}",
                self.base, self.local
            )))
        }
    }

    /// Convert an amount tendered in `currency` into the base currency,
    /// rounded to cents. Returns the converted amount and the rate used.
    ///
    /// The tendered amount itself must already be in cents.
    pub fn to_base(
        &self,
        amount: Decimal,
        currency: &CurrencyCode,
    ) -> LedgerResult<(Decimal, Decimal)> {
        ensure_money_scale("amount_paid", amount)?;
        let rate = self.rate_for(currency)?;
        let converted = amount.checked_div(rate).ok_or_else(|| {
            LedgerError::validation(format!("{amount} {currency} is out of range"))
        })?;
        Ok((round_money(converted), rate))
    }
}

fn ensure_positive(rate: Decimal) -> LedgerResult<()> {
    if rate <= Decimal::ZERO {
        return Err(LedgerError::validation("exchange rate must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> ExchangeRateBook {
        ExchangeRateBook::new(
            "USD".parse().unwrap(),
            "SOS".parse().unwrap(),
            dec!(570),
        )
        .unwrap()
    }

    #[test]
    fn base_currency_converts_at_one() {
        let (amount, rate) = book().to_base(dec!(12.34), &"USD".parse().unwrap()).unwrap();
        assert_eq!(amount, dec!(12.34));
        assert_eq!(rate, Decimal::ONE);
    }

    #[test]
    fn local_currency_is_divided_and_rounded_to_cents() {
        let (amount, rate) = book().to_base(dec!(1000), &"SOS".parse().unwrap()).unwrap();
        assert_eq!(rate, dec!(570));
        // 1000 / 570 = 1.7543...
        assert_eq!(amount, dec!(1.75));
    }

    #[test]
    fn sub_cent_tender_is_rejected_not_rounded() {
        let book = book();
        let err = book.to_base(dec!(10.005), &"USD".parse().unwrap()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        let err = book.to_base(dec!(1000.001), &"SOS".parse().unwrap()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let (amount, _) = book.to_base(dec!(10.50), &"USD".parse().unwrap()).unwrap();
        assert_eq!(amount, dec!(10.50));
    }

    #[test]
    fn unknown_currency_is_a_validation_error() {
        let err = book().to_base(dec!(1), &"EUR".parse().unwrap()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn non_positive_rate_is_rejected_and_keeps_old_rate() {
        let book = book();
        assert!(book.set_rate(Decimal::ZERO).is_err());
        assert_eq!(book.rate(), dec!(570));
        book.set_rate(dec!(560)).unwrap();
        assert_eq!(book.rate(), dec!(560));
    }
}
