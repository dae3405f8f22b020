//! # Gasboard RPC
//!
//! Implementation of the `fees_` namespace.
//!
//! - `fees_list` returns one row per tracked chain, optionally with fiat conversions.
//! - `fees_table` renders the same rows as a plain text table.
//! - `fees_vaults` returns the withdraw cost of every configured vault.
//! - `health` (also `fees_health`) reports liveness.

use crate::{
    aggregator::{FeeAggregator, normalize_currencies, render_table},
    constants::MAX_REQUESTED_CURRENCIES,
    error::ApiError,
    types::{FeesResponse, VaultRow},
};
use jsonrpsee::{
    core::{RpcResult, async_trait},
    proc_macros::rpc,
};
use serde::{Deserialize, Serialize};

/// Fiat currencies requested by a caller, either comma separated or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Currencies {
    /// `"usd,eur"`
    Csv(String),
    /// `["usd", "eur"]`
    List(Vec<String>),
}

impl Currencies {
    /// Normalized, deduplicated currency codes.
    pub fn normalized(&self) -> Vec<String> {
        match self {
            Self::Csv(csv) => normalize_currencies(std::slice::from_ref(csv)),
            Self::List(list) => normalize_currencies(list),
        }
    }
}

impl From<&str> for Currencies {
    fn from(csv: &str) -> Self {
        Self::Csv(csv.to_string())
    }
}

/// Gasboard `fees_` RPC namespace.
#[rpc(server, client, namespace = "fees")]
pub trait FeesApi {
    /// Checks the health of the service.
    #[method(name = "health", aliases = ["health"])]
    async fn health(&self) -> RpcResult<String>;

    /// Native transfer fees of every tracked chain.
    ///
    /// `precise` asks for live gas limits and is ignored unless precise mode is enabled.
    #[method(name = "list")]
    async fn list(
        &self,
        precise: Option<bool>,
        currencies: Option<Currencies>,
    ) -> RpcResult<FeesResponse>;

    /// Same as `fees_list`, rendered as a plain text table.
    #[method(name = "table")]
    async fn table(
        &self,
        precise: Option<bool>,
        currencies: Option<Currencies>,
    ) -> RpcResult<String>;

    /// Withdraw cost of every configured vault.
    #[method(name = "vaults")]
    async fn vaults(&self) -> RpcResult<Vec<VaultRow>>;
}

/// Implementation of the Gasboard `fees_` namespace.
#[derive(Debug, Clone)]
pub struct Fees {
    aggregator: FeeAggregator,
}

impl Fees {
    /// Create a new RPC handler over `aggregator`.
    pub fn new(aggregator: FeeAggregator) -> Self {
        Self { aggregator }
    }

    async fn fees(
        &self,
        precise: Option<bool>,
        currencies: Option<Currencies>,
    ) -> Result<FeesResponse, ApiError> {
        let currencies = validate_currencies(
            currencies.map(|currencies| currencies.normalized()).unwrap_or_default(),
        )?;
        Ok(self.aggregator.get_fees(precise.unwrap_or_default(), &currencies).await)
    }
}

#[async_trait]
impl FeesApiServer for Fees {
    async fn health(&self) -> RpcResult<String> {
        Ok("ok".to_string())
    }

    async fn list(
        &self,
        precise: Option<bool>,
        currencies: Option<Currencies>,
    ) -> RpcResult<FeesResponse> {
        Ok(self.fees(precise, currencies).await?)
    }

    async fn table(
        &self,
        precise: Option<bool>,
        currencies: Option<Currencies>,
    ) -> RpcResult<String> {
        Ok(render_table(&self.fees(precise, currencies).await?))
    }

    async fn vaults(&self) -> RpcResult<Vec<VaultRow>> {
        Ok(self.aggregator.get_vault_fees().await)
    }
}

/// Rejects anything that is not a plausible currency code.
fn validate_currencies(currencies: Vec<String>) -> Result<Vec<String>, ApiError> {
    if currencies.len() > MAX_REQUESTED_CURRENCIES {
        return Err(ApiError::TooManyCurrencies {
            requested: currencies.len(),
            max: MAX_REQUESTED_CURRENCIES,
        });
    }

    if let Some(invalid) = currencies.iter().find(|currency| {
        !(2..=10).contains(&currency.len())
            || !currency.chars().all(|c| c.is_ascii_alphanumeric())
    }) {
        return Err(ApiError::InvalidCurrency(invalid.clone()));
    }

    Ok(currencies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_csv_and_lists() {
        let csv: Currencies = serde_json::from_str(r#""usd, eur,usd""#).unwrap();
        assert_eq!(csv.normalized(), ["USD", "EUR"]);

        let list: Currencies = serde_json::from_str(r#"["gbp","usd"]"#).unwrap();
        assert_eq!(list.normalized(), ["GBP", "USD"]);
    }

    #[test]
    fn validates_currencies() {
        assert_eq!(validate_currencies(vec!["USD".into()]).unwrap(), ["USD"]);
        assert_eq!(
            validate_currencies(vec!["USD".into(), "U$D".into()]),
            Err(ApiError::InvalidCurrency("U$D".into()))
        );
        assert_eq!(
            validate_currencies((0..9).map(|i| format!("C{i}X")).collect()),
            Err(ApiError::TooManyCurrencies { requested: 9, max: MAX_REQUESTED_CURRENCIES })
        );
    }
}
