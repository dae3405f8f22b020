use crate::price::{PriceError, QuoteProvider, decimal_from_f64};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{error, trace};
use url::Url;

/// Header carrying the CoinMarketCap API key.
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// Response of the `cryptocurrency/quotes/latest` endpoint.
#[derive(Debug, Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    data: HashMap<String, QuotesEntry>,
}

/// Quotes of one symbol, keyed by currency.
#[derive(Debug, Deserialize)]
struct QuotesEntry {
    #[serde(default)]
    quote: HashMap<String, Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    price: Option<f64>,
}

/// CoinMarketCap quote provider.
#[derive(Debug, Clone)]
pub struct CoinMarketCap {
    /// HTTP client for making requests.
    client: reqwest::Client,
    /// Quotes endpoint.
    url: Url,
    /// API key.
    api_key: String,
}

impl CoinMarketCap {
    /// Creates a provider querying `url` with `api_key`.
    pub fn new(client: reqwest::Client, url: Url, api_key: String) -> Self {
        Self { client, url, api_key }
    }
}

#[async_trait]
impl QuoteProvider for CoinMarketCap {
    fn name(&self) -> &'static str {
        "coinmarketcap"
    }

    async fn quote(&self, symbol: &str, currency: &str) -> Result<Decimal, PriceError> {
        let response: QuotesResponse = self
            .client
            .get(self.url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("symbol", symbol), ("convert", currency)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .inspect_err(|err| error!(%err, symbol, currency, "Failed to fetch from CoinMarketCap"))?;

        trace!(?response, "CoinMarketCap response");

        let price = response
            .data
            .get(symbol)
            .and_then(|entry| entry.quote.get(currency))
            .and_then(|quote| quote.price)
            .ok_or_else(|| PriceError::MissingQuote {
                symbol: symbol.to_string(),
                currency: currency.to_string(),
            })?;

        match decimal_from_f64(price) {
            Some(price) if price.is_sign_positive() && !price.is_zero() => Ok(price),
            _ => Err(PriceError::Malformed(format!("invalid {symbol}/{currency} price {price}"))),
        }
    }
}
