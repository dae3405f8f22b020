//! Gasboard spawn utilities.
use crate::{
    aggregator::{AggregatorSettings, FeeAggregator},
    chains::ChainRegistry,
    cli::Args,
    config::GasboardConfig,
    estimation::{EstimatorSettings, FeeEstimator},
    metrics::{self, MetricsService, RpcMetricsService},
    price::{CoinMarketCap, ConstantRate, PriceConverter, QuoteProvider, decimal_from_f64},
    rpc::{Fees, FeesApiServer},
    transport::RpcClient,
};
use eyre::OptionExt;
use http::header;
use jsonrpsee::server::{
    RpcServiceBuilder, Server, ServerHandle, middleware::http::ProxyGetRequestLayer,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_http::cors::{AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Context returned once gasboard is launched.
#[derive(Debug, Clone)]
pub struct GasboardHandle {
    /// The socket address to which the server is bound.
    pub local_addr: SocketAddr,
    /// Handle to RPC server.
    pub server: ServerHandle,
    /// The aggregator serving requests.
    pub aggregator: FeeAggregator,
    /// Metrics collector handle.
    pub metrics: PrometheusHandle,
}

impl GasboardHandle {
    /// Returns the url to the http server
    pub fn http_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }
}

/// Attempts to spawn gasboard using CLI arguments and a configuration file.
///
/// A missing configuration file is created from the defaults merged with `args`.
pub async fn try_spawn_with_args<P: AsRef<Path>>(
    args: Args,
    config_path: P,
) -> eyre::Result<GasboardHandle> {
    let config = if !config_path.as_ref().exists() {
        let config = args.merge_config(GasboardConfig::default());
        config.save_to_file(&config_path)?;
        config
    } else {
        // File exists: load and override with CLI values.
        args.merge_config(GasboardConfig::load_from_file(&config_path)?)
    };

    try_spawn(config).await
}

/// Spawns gasboard using the provided [`GasboardConfig`].
pub async fn try_spawn(config: GasboardConfig) -> eyre::Result<GasboardHandle> {
    config.validate()?;

    let metrics = metrics::build_exporter();

    let registry = ChainRegistry::from_env(
        config.chains.clone(),
        config.secrets.infura_project_id.as_deref(),
    )?;

    // every upstream call shares the same connection budget
    let permits = Arc::new(Semaphore::new(config.upstream.max_connections));
    let settings = EstimatorSettings {
        reward_percentile: config.fees.reward_percentile,
        template: config.fees.template,
    };
    let estimators = registry
        .iter()
        .filter_map(|chain| match chain.endpoint() {
            Ok(url) => {
                let client = RpcClient::http(
                    chain.key(),
                    url.clone(),
                    config.upstream.timeout,
                    permits.clone(),
                );
                Some(FeeEstimator::new(chain, client, settings))
            }
            Err(reason) => {
                warn!(chain = chain.key(), reason, "Chain has no RPC endpoint");
                None
            }
        })
        .collect::<Vec<_>>();

    let prices = price_converter(&config)?;
    info!(
        chains = registry.len(),
        estimators = estimators.len(),
        vaults = config.vaults.len(),
        fiat = prices.is_enabled(),
        "Configured fee aggregator"
    );

    let aggregator = FeeAggregator::new(
        registry,
        estimators,
        prices,
        config.vaults.clone(),
        AggregatorSettings {
            cache_ttl: config.fees.cache_ttl,
            precise_enabled: config.fees.precise_mode,
        },
    );

    let rpc = Fees::new(aggregator.clone()).into_rpc();

    // http layers
    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_origin(AllowOrigin::any())
        .allow_headers([header::CONTENT_TYPE]);
    let recorder = metrics.clone();

    // start server
    let server = Server::builder()
        .http_only()
        .max_connections(config.server.max_connections)
        .set_http_middleware(
            ServiceBuilder::new()
                .layer(cors)
                .layer_fn(move |inner| MetricsService::new(inner, recorder.clone()))
                .layer(ProxyGetRequestLayer::new("/health", "health")?)
                .layer(ProxyGetRequestLayer::new("/fees", "fees_list")?)
                .layer(ProxyGetRequestLayer::new("/fees/table", "fees_table")?)
                .layer(ProxyGetRequestLayer::new("/fees/vaults", "fees_vaults")?),
        )
        .set_rpc_middleware(RpcServiceBuilder::new().layer_fn(RpcMetricsService::new))
        .build((config.server.address, config.server.port))
        .await?;
    let addr = server.local_addr()?;
    info!(%addr, "Started gasboard");

    Ok(GasboardHandle { local_addr: addr, server: server.start(rpc), aggregator, metrics })
}

/// Picks the quote provider: a constant rate, CoinMarketCap if a key is set, or none.
fn price_converter(config: &GasboardConfig) -> eyre::Result<PriceConverter> {
    let provider: Arc<dyn QuoteProvider> = if let Some(constant_rate) =
        config.pricefeed.constant_rate
    {
        warn!("Setting a constant price rate: {constant_rate}. Should not be used in production!");
        let rate = decimal_from_f64(constant_rate).ok_or_eyre("invalid constant rate")?;
        Arc::new(ConstantRate::new(rate))
    } else if let Some(api_key) =
        config.secrets.coinmarketcap_api_key.clone().filter(|key| !key.is_empty())
    {
        let client = reqwest::Client::builder().timeout(config.upstream.timeout).build()?;
        Arc::new(CoinMarketCap::new(client, config.pricefeed.coinmarketcap_url.clone(), api_key))
    } else {
        info!("No price feed configured, fiat conversion is disabled");
        return Ok(PriceConverter::disabled());
    };

    Ok(PriceConverter::new(provider, config.pricefeed.cache_ttl))
}
