//! Process configuration, read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use shopledger_core::CurrencyCode;

use crate::reconciliation::ReconcileMode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// What to do with the ledgers when the process starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupReconcile {
    Off,
    Run(ReconcileMode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub bind_addr: SocketAddr,
    pub base_currency: CurrencyCode,
    pub local_currency: CurrencyCode,
    /// Local units per base unit.
    pub local_rate: Decimal,
    pub lock_timeout: Duration,
    pub reconcile_on_startup: StartupReconcile,
}

impl LedgerConfig {
    pub const BIND_ADDR: &'static str = "SHOPLEDGER_BIND_ADDR";
    pub const BASE_CURRENCY: &'static str = "SHOPLEDGER_BASE_CURRENCY";
    pub const LOCAL_CURRENCY: &'static str = "SHOPLEDGER_LOCAL_CURRENCY";
    pub const LOCAL_RATE: &'static str = "SHOPLEDGER_LOCAL_RATE";
    pub const LOCK_TIMEOUT_MS: &'static str = "SHOPLEDGER_LOCK_TIMEOUT_MS";
    pub const RECONCILE_ON_STARTUP: &'static str = "SHOPLEDGER_RECONCILE_ON_STARTUP";

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = parse_or(&lookup, Self::BIND_ADDR, "0.0.0.0:8080", |s| {
            s.parse::<SocketAddr>().map_err(|e| e.to_string())
        })?;
        let base_currency = parse_or(&lookup, Self::BASE_CURRENCY, "USD", parse_currency)?;
        let local_currency = parse_or(&lookup, Self::LOCAL_CURRENCY, "SOS", parse_currency)?;

        let local_rate = match lookup(Self::LOCAL_RATE) {
            Some(raw) => {
                parse_rate(&raw).map_err(|reason| invalid(Self::LOCAL_RATE, &raw, reason))?
            }
            None => {
                tracing::warn!(
                    var = Self::LOCAL_RATE,
                    "local exchange rate not set; using 1 until it is configured"
                );
                Decimal::ONE
            }
        };

        let lock_timeout_ms = parse_or(&lookup, Self::LOCK_TIMEOUT_MS, "5000", |s| {
            match s.parse::<u64>() {
                Ok(0) => Err("must be positive".to_string()),
                Ok(ms) => Ok(ms),
                Err(e) => Err(e.to_string()),
            }
        })?;

        let reconcile_on_startup =
            parse_or(&lookup, Self::RECONCILE_ON_STARTUP, "verify", |s| {
                match s.to_ascii_lowercase().as_str() {
                    "off" => Ok(StartupReconcile::Off),
                    "verify" => Ok(StartupReconcile::Run(ReconcileMode::Verify)),
                    "repair" => Ok(StartupReconcile::Run(ReconcileMode::Repair)),
                    _ => Err("expected off, verify or repair".to_string()),
                }
            })?;

        if base_currency == local_currency {
            return Err(invalid(
                Self::LOCAL_CURRENCY,
                local_currency.as_str(),
                "must differ from the base currency".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            base_currency,
            local_currency,
            local_rate,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            reconcile_on_startup,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    let raw = lookup(var).unwrap_or_else(|| default.to_string());
    parse(raw.trim()).map_err(|reason| invalid(var, &raw, reason))
}

fn parse_currency(s: &str) -> Result<CurrencyCode, String> {
    CurrencyCode::from_str(s).map_err(|e| e.to_string())
}

fn parse_rate(s: &str) -> Result<Decimal, String> {
    let rate = Decimal::from_str(s.trim()).map_err(|e| e.to_string())?;
    if rate <= Decimal::ZERO {
        return Err("must be positive".to_string());
    }
    Ok(rate)
}

fn invalid(var: &'static str, value: &str, reason: String) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason,
    }
}
