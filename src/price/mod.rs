//! Fiat pricing of native fees.
//!
//! Quotes come from a [`QuoteProvider`] and are cached per `(symbol, currency)` by the
//! [`PriceConverter`]. Pricing is optional: without a provider every conversion fails with
//! [`PriceError::Disabled`], which callers surface next to the fee instead of failing it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::{fmt, str::FromStr};
use thiserror::Error;

mod converter;
pub use converter::PriceConverter;

mod fetchers;
pub use fetchers::*;

mod metrics;

/// Errors of a fiat conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// No quote provider is configured.
    #[error("fiat pricing is not configured")]
    Disabled,
    /// The quote request failed.
    #[error("price feed request failed: {0}")]
    Request(String),
    /// The provider has no quote for the pair.
    #[error("no {currency} quote for {symbol}")]
    MissingQuote {
        /// Asset symbol.
        symbol: String,
        /// Fiat currency.
        currency: String,
    },
    /// The provider answered with something that is not a usable quote.
    #[error("malformed price feed response: {0}")]
    Malformed(String),
    /// The fee does not fit the decimal range.
    #[error("fiat value out of range")]
    Overflow,
}

impl From<reqwest::Error> for PriceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// A source of fiat quotes.
#[async_trait]
pub trait QuoteProvider: Send + Sync + fmt::Debug {
    /// Name of the provider, for logs and metrics.
    fn name(&self) -> &'static str;

    /// Price of one unit of `symbol` in `currency`. Both are uppercase.
    async fn quote(&self, symbol: &str, currency: &str) -> Result<Decimal, PriceError>;
}

/// Converts a float rate to a decimal through its shortest representation.
///
/// `30.1` becomes `30.1` rather than the closest binary fraction.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}
