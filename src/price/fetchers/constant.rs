use crate::price::{PriceError, QuoteProvider};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Quotes the same rate for every symbol and currency.
///
/// Useful for local setups and tests that should not depend on an external feed.
#[derive(Debug, Clone, Copy)]
pub struct ConstantRate {
    rate: Decimal,
}

impl ConstantRate {
    /// Creates a provider quoting `rate`.
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }
}

#[async_trait]
impl QuoteProvider for ConstantRate {
    fn name(&self) -> &'static str {
        "constant"
    }

    async fn quote(&self, _symbol: &str, _currency: &str) -> Result<Decimal, PriceError> {
        Ok(self.rate)
    }
}
