use super::{PriceError, QuoteProvider, metrics::QuoteMetrics};
use crate::{
    cache::{QuoteCache, QuoteKey},
    constants::{DEFAULT_PRICE_CACHE_TTL, FIAT_DISPLAY_DIGITS, NATIVE_DECIMALS},
    types::FiatValue,
};
use futures_util::future::try_join_all;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Converts native fees to fiat currencies with cached quotes.
#[derive(Clone)]
pub struct PriceConverter {
    provider: Option<Arc<dyn QuoteProvider>>,
    cache: QuoteCache,
}

impl fmt::Debug for PriceConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceConverter")
            .field("provider", &self.provider.as_ref().map(|provider| provider.name()))
            .field("cache", &self.cache)
            .finish()
    }
}

impl PriceConverter {
    /// Creates a converter whose quotes live for `ttl`.
    pub fn new(provider: Arc<dyn QuoteProvider>, ttl: Duration) -> Self {
        Self { provider: Some(provider), cache: QuoteCache::new(ttl) }
    }

    /// A converter without provider. Every conversion fails with [`PriceError::Disabled`].
    pub fn disabled() -> Self {
        Self { provider: None, cache: QuoteCache::new(DEFAULT_PRICE_CACHE_TTL) }
    }

    /// Whether a provider is configured.
    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Price of one unit of `symbol` in `currency`.
    pub async fn quote(&self, symbol: &str, currency: &str) -> Result<Decimal, PriceError> {
        let provider = self.provider.as_ref().ok_or(PriceError::Disabled)?;
        let key = QuoteKey::new(symbol, currency);

        self.cache
            .get_or_fetch(key.clone(), || async {
                let metrics = QuoteMetrics::new_with_labels(&[
                    ("symbol", key.symbol.clone()),
                    ("currency", key.currency.clone()),
                ]);
                metrics.requests.increment(1);

                match provider.quote(&key.symbol, &key.currency).await {
                    Ok(rate) => {
                        debug!(
                            provider = provider.name(),
                            symbol = %key.symbol,
                            currency = %key.currency,
                            %rate,
                            "Fetched quote"
                        );
                        metrics.rate.set(rate.to_f64().unwrap_or_default());
                        Ok(rate)
                    }
                    Err(err) => {
                        warn!(
                            provider = provider.name(),
                            symbol = %key.symbol,
                            currency = %key.currency,
                            %err,
                            "Quote unavailable"
                        );
                        metrics.errors.increment(1);
                        Err(err)
                    }
                }
            })
            .await
            .map_err(|err| (*err).clone())
    }

    /// Converts `native_fee_wei` of `symbol` to each of `currencies`.
    ///
    /// Fails as a whole if any currency cannot be quoted.
    pub async fn convert(
        &self,
        native_fee_wei: u128,
        symbol: &str,
        currencies: &[String],
    ) -> Result<BTreeMap<String, FiatValue>, PriceError> {
        let rates = try_join_all(currencies.iter().map(|currency| self.quote(symbol, currency)))
            .await?;

        currencies
            .iter()
            .zip(rates)
            .map(|(currency, rate)| {
                let currency = currency.to_uppercase();
                let value = fiat_value(native_fee_wei, rate)?;
                let fiat = FiatValue {
                    currency: currency.clone(),
                    value: value.to_f64().ok_or(PriceError::Overflow)?,
                    formatted: value.to_string(),
                    price_symbol: symbol.to_uppercase(),
                };
                Ok((currency, fiat))
            })
            .collect()
    }
}

/// `wei / 10^18 × rate`, rounded half-up to the fiat display digits.
fn fiat_value(native_fee_wei: u128, rate: Decimal) -> Result<Decimal, PriceError> {
    let wei = i128::try_from(native_fee_wei).map_err(|_| PriceError::Overflow)?;
    let native = Decimal::try_from_i128_with_scale(wei, NATIVE_DECIMALS)
        .map_err(|_| PriceError::Overflow)?;

    let mut value = native
        .checked_mul(rate)
        .ok_or(PriceError::Overflow)?
        .round_dp_with_strategy(FIAT_DISPLAY_DIGITS, RoundingStrategy::MidpointAwayFromZero);
    value.rescale(FIAT_DISPLAY_DIGITS);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::ConstantRate;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Failing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuoteProvider for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn quote(&self, _: &str, _: &str) -> Result<Decimal, PriceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PriceError::Request("503 Service Unavailable".into()))
        }
    }

    fn constant(rate: Decimal) -> PriceConverter {
        PriceConverter::new(Arc::new(ConstantRate::new(rate)), Duration::from_secs(300))
    }

    #[tokio::test]
    async fn converts_fee_to_fiat() {
        let converter = constant(Decimal::from(30));
        let fiat = converter
            .convert(63_000_000_000_000, "eth", &["usd".to_string()])
            .await
            .unwrap();

        let usd = &fiat["USD"];
        assert_eq!(usd.currency, "USD");
        assert_eq!(usd.price_symbol, "ETH");
        assert_eq!(usd.formatted, "0.001890");
        assert!((usd.value - 0.00189).abs() < 1e-12);
    }

    #[tokio::test]
    async fn converts_to_every_currency() {
        let converter = constant(Decimal::new(25, 1));
        let fiat = converter
            .convert(1_000_000_000_000_000_000, "POL", &["USD".to_string(), "EUR".to_string()])
            .await
            .unwrap();

        assert_eq!(fiat.keys().collect::<Vec<_>>(), ["EUR", "USD"]);
        assert_eq!(fiat["EUR"].formatted, "2.500000");
    }

    #[tokio::test]
    async fn disabled_converter() {
        let err = PriceConverter::disabled()
            .convert(1, "ETH", &["USD".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err, PriceError::Disabled);
    }

    #[tokio::test]
    async fn provider_failure_is_not_cached() {
        let provider = Arc::new(Failing::default());
        let converter = PriceConverter::new(provider.clone(), Duration::from_secs(300));

        for _ in 0..2 {
            let err = converter.quote("ETH", "USD").await.unwrap_err();
            assert_eq!(err.to_string(), "price feed request failed: 503 Service Unavailable");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rounds_half_up() {
        // 0.0000005 rounds up at six digits
        let value = fiat_value(500_000_000_000, Decimal::ONE).unwrap();
        assert_eq!(value.to_string(), "0.000001");
        assert_eq!(fiat_value(0, Decimal::ONE).unwrap().to_string(), "0.000000");
    }
}
