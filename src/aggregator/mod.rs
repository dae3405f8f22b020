//! Fee aggregation across every tracked chain.
//!
//! The [`FeeAggregator`] owns the per-chain estimators, the fee cache and the price converter.
//! Chains are fetched concurrently through the cache; the rows come back in registry order and a
//! failing chain only ever affects its own row.

use crate::{
    cache::{FeeCache, Lookup, unix_now},
    chains::{Chain, ChainRegistry},
    config::VaultConfig,
    estimation::{FeeEstimate, FeeEstimator},
    price::PriceConverter,
    types::{FeeRow, FeesMeta, FeesResponse},
};
use futures_util::future::join_all;
use itertools::Itertools;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{debug, instrument};

mod table;
pub use table::render_table;

mod vaults;

/// Aggregator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorSettings {
    /// Lifetime of cached estimates.
    pub cache_ttl: Duration,
    /// Whether requests may ask for live gas limits.
    pub precise_enabled: bool,
}

/// Assembles fee responses from the cached per-chain estimates.
#[derive(Debug, Clone)]
pub struct FeeAggregator {
    inner: Arc<AggregatorInner>,
}

#[derive(Debug)]
struct AggregatorInner {
    /// Tracked chains, in response order.
    registry: ChainRegistry,
    /// Estimators of the chains with an endpoint.
    estimators: HashMap<String, FeeEstimator>,
    /// Estimates keyed by `<chain>:<precise>`.
    fees: FeeCache<FeeEstimate>,
    /// Fiat conversion.
    prices: PriceConverter,
    /// Priced vaults, in response order.
    vaults: Vec<VaultConfig>,
    settings: AggregatorSettings,
}

impl FeeAggregator {
    /// Creates an aggregator over `registry`.
    ///
    /// Chains without an estimator report their endpoint resolution error.
    pub fn new(
        registry: ChainRegistry,
        estimators: impl IntoIterator<Item = FeeEstimator>,
        prices: PriceConverter,
        vaults: Vec<VaultConfig>,
        settings: AggregatorSettings,
    ) -> Self {
        let estimators = estimators
            .into_iter()
            .map(|estimator| (estimator.chain().to_string(), estimator))
            .collect();

        Self {
            inner: Arc::new(AggregatorInner {
                registry,
                estimators,
                fees: FeeCache::new("fees", settings.cache_ttl),
                prices,
                vaults,
                settings,
            }),
        }
    }

    /// The tracked chains.
    pub fn registry(&self) -> &ChainRegistry {
        &self.inner.registry
    }

    /// Whether requests may ask for live gas limits.
    pub fn precise_enabled(&self) -> bool {
        self.inner.settings.precise_enabled
    }

    /// Fees of every chain, converted to `currencies`.
    ///
    /// `precise` only takes effect if enabled on this aggregator.
    #[instrument(skip(self))]
    pub async fn get_fees(&self, precise: bool, currencies: &[String]) -> FeesResponse {
        let precise_enabled = self.precise_enabled();
        let effective = precise && precise_enabled;
        let currencies = normalize_currencies(currencies);

        let data = join_all(
            self.inner.registry.iter().map(|chain| self.chain_row(chain, effective, &currencies)),
        )
        .await;

        debug!(
            rows = data.len(),
            failed = data.iter().filter(|row| !row.is_populated()).count(),
            "Assembled fees"
        );

        FeesResponse {
            meta: FeesMeta {
                generated_at: unix_now(),
                cache_ttl_seconds: self.inner.settings.cache_ttl.as_secs(),
                precise_requested: precise,
                precise_enabled,
                currencies,
            },
            data,
        }
    }

    /// Row of one chain.
    async fn chain_row(&self, chain: &Chain, precise: bool, currencies: &[String]) -> FeeRow {
        let mut row = match self.estimate(chain, precise).await {
            Ok(lookup) => FeeRow::populated(
                chain.info(),
                chain.price_symbol(),
                &lookup.value,
                lookup.stale,
                lookup.fetched_at,
                lookup.note,
            ),
            Err(err) => FeeRow::failed(chain.info(), chain.price_symbol(), err, unix_now()),
        };

        if let Some(native_fee) = row.native_fee.as_ref().map(|fee| fee.wei)
            && !currencies.is_empty()
        {
            match self.inner.prices.convert(native_fee, &row.price_symbol, currencies).await {
                Ok(fiat) => row.fiat = Some(fiat),
                Err(err) => row.fiat_error = Some(err.to_string()),
            }
        }

        row
    }

    /// Cached estimate of `chain`.
    async fn estimate(&self, chain: &Chain, precise: bool) -> Result<Lookup<FeeEstimate>, String> {
        if let Err(reason) = chain.endpoint() {
            return Err(format!("missing RPC url: {reason}"));
        }
        let estimator = self
            .inner
            .estimators
            .get(chain.key())
            .cloned()
            .ok_or_else(|| format!("no estimator for chain '{}'", chain.key()))?;

        let key = format!("{}:{}", chain.key(), u8::from(precise));
        self.inner
            .fees
            .get_or_refresh(&key, move || async move { estimator.estimate(precise).await })
            .await
    }
}

/// Uppercases, trims and dedups requested currencies, keeping their order.
pub fn normalize_currencies(currencies: &[String]) -> Vec<String> {
    currencies
        .iter()
        .flat_map(|currencies| currencies.split(','))
        .map(|currency| currency.trim().to_uppercase())
        .filter(|currency| !currency.is_empty())
        .unique()
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        config::default_chains,
        estimation::{EstimatorSettings, FeeMode},
        price::ConstantRate,
        transport::mock::{MockReply, MockTransport},
    };
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    pub(crate) const TTL: Duration = Duration::from_secs(60);

    /// Replies of a healthy node for every strategy.
    pub(crate) fn healthy(method: &str, _: &Value) -> MockReply {
        match method {
            "eth_feeHistory" => MockReply::result(json!({
                "baseFeePerGas": ["0x3b9aca00"],
                "reward": [["0x77359400"]],
            })),
            "eth_gasPrice" => MockReply::result(json!("0x3b9aca00")),
            "eth_estimateGas" => MockReply::result(json!("0x5208")),
            "eth_call" => MockReply::result(json!(format!("0x{:064x}", 1_000u64))),
            "linea_estimateGas" => MockReply::result(json!({ "gasLimit": "0x5208" })),
            _ => MockReply::method_not_found(),
        }
    }

    /// A node that behaves like [`healthy`] while `up` is set and fails every call otherwise.
    pub(crate) fn switchable(up: Arc<AtomicBool>) -> MockTransport {
        MockTransport::new(move |method, params| {
            if up.load(Ordering::SeqCst) {
                healthy(method, params)
            } else {
                MockReply::error(-32000, "down")
            }
        })
    }

    /// An aggregator over the default chains, each served by the transport `node` returns.
    pub(crate) fn aggregator(
        node: impl Fn(&str) -> Option<MockTransport>,
        prices: PriceConverter,
        vaults: Vec<VaultConfig>,
    ) -> FeeAggregator {
        let configs = default_chains()
            .into_iter()
            .map(|config| {
                let url = format!("http://{}.invalid", config.key).parse().unwrap();
                if node(&config.key).is_some() { config.with_endpoint(url) } else { config }
            })
            .collect();
        let registry = ChainRegistry::resolve(configs, |_| None, None).unwrap();

        let settings = EstimatorSettings { reward_percentile: 50.0, template: Default::default() };
        let estimators = registry
            .iter()
            .filter_map(|chain| {
                let transport = node(chain.key())?;
                Some(FeeEstimator::new(chain, transport.client(chain.key()), settings))
            })
            .collect::<Vec<_>>();

        FeeAggregator::new(
            registry,
            estimators,
            prices,
            vaults,
            AggregatorSettings { cache_ttl: TTL, precise_enabled: true },
        )
    }

    fn keys(response: &FeesResponse) -> Vec<&str> {
        response.data.iter().map(|row| row.chain.key.as_str()).collect()
    }

    #[tokio::test]
    async fn rows_follow_registry_order() {
        let transport = MockTransport::new(healthy);
        let aggregator = aggregator(|_| Some(transport.clone()), PriceConverter::disabled(), vec![]);

        let response = aggregator.get_fees(false, &[]).await;
        assert_eq!(keys(&response), ["ethereum", "polygon", "arbitrum", "optimism", "avalanche", "linea"]);
        assert!(response.data.iter().all(FeeRow::is_populated));

        let ethereum = &response.data[0];
        assert_eq!(ethereum.gas_price.as_ref().unwrap().gwei, "3.0000");
        assert_eq!(ethereum.native_fee.as_ref().unwrap().wei, 63_000_000_000_000);
        assert_eq!(ethereum.mode, Some(FeeMode::Standard));

        let optimism = &response.data[3];
        assert_eq!(optimism.l1_fee.as_ref().unwrap().wei, 1_000);
        assert_eq!(optimism.mode, Some(FeeMode::RollupL1Inclusive));

        assert_eq!(response.meta.cache_ttl_seconds, 60);
        assert!(!response.meta.precise_requested);
        assert!(response.meta.precise_enabled);
    }

    #[tokio::test]
    async fn failing_chain_keeps_its_row() {
        let healthy_node = MockTransport::new(healthy);
        let broken = MockTransport::new(|_, _| MockReply::error(-32005, "daily request limit reached"));
        let aggregator = aggregator(
            |key| Some(if key == "polygon" { broken.clone() } else { healthy_node.clone() }),
            PriceConverter::disabled(),
            vec![],
        );

        let response = aggregator.get_fees(false, &[]).await;
        assert_eq!(response.data.len(), 6);

        let polygon = &response.data[1];
        assert_eq!(polygon.chain.key, "polygon");
        assert_eq!(polygon.error.as_deref(), Some("rpc error -32005: daily request limit reached"));
        assert!(polygon.native_fee.is_none());
        assert!(response.data.iter().filter(|row| row.chain.key != "polygon").all(FeeRow::is_populated));
    }

    #[tokio::test]
    async fn chain_without_endpoint_reports_it() {
        let transport = MockTransport::new(healthy);
        let aggregator = aggregator(
            |key| (key != "avalanche").then(|| transport.clone()),
            PriceConverter::disabled(),
            vec![],
        );

        let response = aggregator.get_fees(false, &[]).await;
        let avalanche = &response.data[4];
        assert_eq!(
            avalanche.error.as_deref(),
            Some("missing RPC url: RPC endpoint missing. Set RPC_AVALANCHE_URL or INFURA_PROJECT_ID.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_chain_is_isolated() {
        let healthy_node = MockTransport::new(healthy);
        let hanging = MockTransport::new(|_, _| MockReply::Hang);
        let aggregator = aggregator(
            |key| Some(if key == "optimism" { hanging.clone() } else { healthy_node.clone() }),
            PriceConverter::disabled(),
            vec![],
        );

        let response = aggregator.get_fees(false, &[]).await;
        assert_eq!(response.data.len(), 6);
        assert_eq!(response.data[3].chain.key, "optimism");
        assert_eq!(response.data[3].error.as_deref(), Some("request timed out"));
        assert_eq!(response.data.iter().filter(|row| row.is_populated()).count(), 5);
    }

    #[tokio::test]
    async fn repeated_requests_hit_the_cache() {
        let transport = MockTransport::new(healthy);
        let aggregator = aggregator(|_| Some(transport.clone()), PriceConverter::disabled(), vec![]);

        let first = aggregator.get_fees(false, &[]).await;
        let calls = transport.calls().len();
        let second = aggregator.get_fees(false, &[]).await;

        assert_eq!(transport.calls().len(), calls);
        for (a, b) in first.data.iter().zip(&second.data) {
            assert_eq!(a.fetched_at, b.fetched_at);
            assert_eq!(a.native_fee, b.native_fee);
        }
    }

    #[tokio::test]
    async fn precise_requests_use_live_gas_limits() {
        let transport = MockTransport::new(healthy);
        let aggregator = aggregator(|_| Some(transport.clone()), PriceConverter::disabled(), vec![]);

        let response = aggregator.get_fees(true, &[]).await;
        assert!(response.meta.precise_requested);
        assert_eq!(response.data[0].mode, Some(FeeMode::Precise));
    }

    #[tokio::test]
    async fn converts_to_requested_currencies() {
        let transport = MockTransport::new(healthy);
        let prices = PriceConverter::new(Arc::new(ConstantRate::new(Decimal::from(30))), TTL);
        let aggregator = aggregator(|_| Some(transport.clone()), prices, vec![]);

        let response = aggregator.get_fees(false, &["usd".to_string()]).await;
        assert_eq!(response.meta.currencies, ["USD"]);

        let fiat = response.data[0].fiat.as_ref().unwrap();
        assert_eq!(fiat["USD"].formatted, "0.001890");
        assert!(response.data[0].fiat_error.is_none());
    }

    #[tokio::test]
    async fn price_failure_sets_fiat_error() {
        let transport = MockTransport::new(healthy);
        let aggregator = aggregator(|_| Some(transport.clone()), PriceConverter::disabled(), vec![]);

        let response = aggregator.get_fees(false, &["USD".to_string()]).await;
        let ethereum = &response.data[0];
        assert!(ethereum.is_populated());
        assert!(ethereum.fiat.is_none());
        assert_eq!(ethereum.fiat_error.as_deref(), Some("fiat pricing is not configured"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_serves_stale_row() {
        let up = Arc::new(AtomicBool::new(true));
        let transport = switchable(up.clone());
        let prices = PriceConverter::new(Arc::new(ConstantRate::new(Decimal::from(30))), TTL);
        let aggregator = aggregator(|_| Some(transport.clone()), prices, vec![]);
        let usd = ["USD".to_string()];

        let fresh = aggregator.get_fees(false, &usd).await;
        let before = fresh.data[0].clone();
        assert!(!before.stale);

        up.store(false, Ordering::SeqCst);
        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        let degraded = aggregator.get_fees(false, &usd).await;
        assert_eq!(degraded.data.len(), 6);

        let ethereum = &degraded.data[0];
        assert!(ethereum.stale);
        assert!(ethereum.error.is_none());
        assert_eq!(ethereum.gas_price, before.gas_price);
        assert_eq!(ethereum.gas_limit, before.gas_limit);
        assert_eq!(ethereum.native_fee, before.native_fee);
        assert_eq!(ethereum.fetched_at, before.fetched_at);
        assert!(ethereum.notes.as_deref().unwrap().contains("refresh failed: "));
        assert_eq!(ethereum.fiat.as_ref().unwrap()["USD"].formatted, "0.001890");
        assert!(ethereum.fiat_error.is_none());
    }

    #[test]
    fn currencies_are_normalized() {
        let currencies = ["usd, eur".to_string(), "USD".to_string(), " ".to_string()];
        assert_eq!(normalize_currencies(&currencies), ["USD", "EUR"]);
    }
}
