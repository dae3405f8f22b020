//! Gasboard configuration.
use crate::{
    chains::FeeStrategy,
    constants::{
        COINMARKETCAP_QUOTES_URL, DEFAULT_CACHE_TTL, DEFAULT_ESTIMATE_FROM, DEFAULT_ESTIMATE_TO,
        DEFAULT_ESTIMATE_VALUE_WEI, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_OUTBOUND_CONNECTIONS,
        DEFAULT_PORT, DEFAULT_PRICE_CACHE_TTL, DEFAULT_REWARD_PERCENTILE,
        DEFAULT_RPC_MAX_CONNECTIONS, MIN_CACHE_TTL, MIN_PRICE_CACHE_TTL, NATIVE_TRANSFER_GAS,
    },
};
use alloy::primitives::Address;
use eyre::{Context, ensure};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};
use url::Url;

/// Gasboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasboardConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Fee estimation and caching.
    #[serde(default)]
    pub fees: FeeConfig,
    /// Upstream RPC settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Price feed config.
    #[serde(default)]
    pub pricefeed: PriceFeedConfig,
    /// Tracked chains, in display order.
    #[serde(default = "default_chains")]
    pub chains: Vec<ChainConfig>,
    /// Yield vaults whose withdraw cost is reported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vaults: Vec<VaultConfig>,
    /// Secrets.
    #[serde(skip_serializing, default)]
    pub secrets: SecretsConfig,
}

impl Default for GasboardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            fees: FeeConfig::default(),
            upstream: UpstreamConfig::default(),
            pricefeed: PriceFeedConfig::default(),
            chains: default_chains(),
            vaults: Vec::new(),
            secrets: SecretsConfig::default(),
        }
    }
}

impl GasboardConfig {
    /// Sets the IP address to serve the RPC on.
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.server.address = address;
        self
    }

    /// Sets the port to serve the RPC on.
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Sets the maximum number of concurrent inbound connections.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.server.max_connections = max_connections;
        self
    }

    /// Sets the lifetime of cached fee estimates.
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.fees.cache_ttl = cache_ttl;
        self
    }

    /// Allows requests to use live gas estimates.
    pub fn with_precise_mode(mut self, enabled: bool) -> Self {
        self.fees.precise_mode = enabled;
        self
    }

    /// Sets the `eth_feeHistory` reward percentile.
    pub fn with_reward_percentile(mut self, percentile: f64) -> Self {
        self.fees.reward_percentile = percentile;
        self
    }

    /// Sets the upstream request timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.upstream.timeout = timeout;
        self
    }

    /// Sets the maximum number of concurrent outbound RPC calls.
    pub fn with_max_outbound_connections(mut self, max_connections: usize) -> Self {
        self.upstream.max_connections = max_connections;
        self
    }

    /// Sets the lifetime of cached fiat quotes.
    pub fn with_price_cache_ttl(mut self, ttl: Duration) -> Self {
        self.pricefeed.cache_ttl = ttl;
        self
    }

    /// Sets a constant fiat rate for every quote. Used for testing.
    pub fn with_constant_rate(mut self, constant_rate: Option<f64>) -> Self {
        self.pricefeed.constant_rate = constant_rate.or(self.pricefeed.constant_rate);
        self
    }

    /// Sets the tracked chains.
    pub fn with_chains(mut self, chains: Vec<ChainConfig>) -> Self {
        self.chains = chains;
        self
    }

    /// Sets the tracked vaults.
    pub fn with_vaults(mut self, vaults: Vec<VaultConfig>) -> Self {
        self.vaults = vaults;
        self
    }

    /// Sets the Infura project id used for chains without an explicit endpoint.
    pub fn with_infura_project_id(mut self, project_id: Option<String>) -> Self {
        if let Some(project_id) = project_id {
            self.secrets.infura_project_id = Some(project_id);
        }
        self
    }

    /// Sets the CoinMarketCap API key.
    pub fn with_coinmarketcap_api_key(mut self, api_key: Option<String>) -> Self {
        if let Some(api_key) = api_key {
            self.secrets.coinmarketcap_api_key = Some(api_key);
        }
        self
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Checks the bounds of every setting.
    pub fn validate(&self) -> eyre::Result<()> {
        ensure!(
            self.fees.cache_ttl >= MIN_CACHE_TTL,
            "fees.cache_ttl must be at least {}s",
            MIN_CACHE_TTL.as_secs()
        );
        ensure!(
            (0.0..=100.0).contains(&self.fees.reward_percentile),
            "fees.reward_percentile must be within 0..=100"
        );
        ensure!(
            self.pricefeed.cache_ttl >= MIN_PRICE_CACHE_TTL,
            "pricefeed.cache_ttl must be at least {}s",
            MIN_PRICE_CACHE_TTL.as_secs()
        );
        ensure!(self.upstream.timeout >= Duration::from_secs(1), "upstream.timeout must be >= 1s");
        ensure!(self.upstream.max_connections >= 1, "upstream.max_connections must be >= 1");

        if let Some(key) = self.chains.iter().map(|c| &c.key).duplicates().next() {
            eyre::bail!("chain '{key}' is configured more than once");
        }
        for chain in &self.chains {
            ensure!(
                chain.native_gas_limit >= NATIVE_TRANSFER_GAS,
                "chain '{}': native_gas_limit must be at least {NATIVE_TRANSFER_GAS}",
                chain.key
            );
        }
        if let Some(key) = self.vaults.iter().map(|v| &v.key).duplicates().next() {
            eyre::bail!("vault '{key}' is configured more than once");
        }

        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address to serve the RPC on.
    pub address: IpAddr,
    /// The port to serve the RPC on.
    pub port: u16,
    /// The maximum number of concurrent inbound connections.
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_RPC_MAX_CONNECTIONS,
        }
    }
}

/// Fee estimation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Lifetime of a cached fee estimate.
    #[serde(with = "crate::serde::duration")]
    pub cache_ttl: Duration,
    /// Whether requests may ask for live `eth_estimateGas` gas limits.
    pub precise_mode: bool,
    /// Percentile of the priority fees sampled from `eth_feeHistory`.
    pub reward_percentile: f64,
    /// Transfer used for gas estimation calls.
    pub template: TransferTemplate,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            precise_mode: false,
            reward_percentile: DEFAULT_REWARD_PERCENTILE,
            template: TransferTemplate::default(),
        }
    }
}

/// The native transfer that is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTemplate {
    /// Sender.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Transferred value in wei.
    pub value: u64,
}

impl Default for TransferTemplate {
    fn default() -> Self {
        Self {
            from: DEFAULT_ESTIMATE_FROM,
            to: DEFAULT_ESTIMATE_TO,
            value: DEFAULT_ESTIMATE_VALUE_WEI,
        }
    }
}

/// Upstream RPC configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Timeout of a single RPC call.
    #[serde(with = "crate::serde::duration")]
    pub timeout: Duration,
    /// Maximum number of concurrent outbound calls across all chains.
    pub max_connections: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_HTTP_TIMEOUT, max_connections: DEFAULT_MAX_OUTBOUND_CONNECTIONS }
    }
}

/// Fiat price feed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFeedConfig {
    /// Lifetime of a cached quote.
    #[serde(with = "crate::serde::duration")]
    pub cache_ttl: Duration,
    /// CoinMarketCap quotes endpoint.
    pub coinmarketcap_url: Url,
    /// Sets a constant rate for every quote. Used for testing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant_rate: Option<f64>,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_PRICE_CACHE_TTL,
            coinmarketcap_url: Url::parse(COINMARKETCAP_QUOTES_URL)
                .expect("valid CoinMarketCap url"),
            constant_rate: None,
        }
    }
}

/// Secrets, never written back to the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretsConfig {
    /// Infura project id.
    pub infura_project_id: Option<String>,
    /// CoinMarketCap API key.
    pub coinmarketcap_api_key: Option<String>,
}

/// A tracked chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Unique key, e.g. `ethereum`.
    pub key: String,
    /// Human readable name.
    pub display_name: String,
    /// Native currency symbol.
    pub symbol: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Symbol used for fiat quotes. Defaults to [`Self::symbol`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_symbol: Option<String>,
    /// How fees are estimated.
    pub strategy: FeeStrategy,
    /// Gas limit of a native transfer.
    #[serde(default = "default_native_gas_limit")]
    pub native_gas_limit: u64,
    /// Explicit RPC endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Url>,
    /// Environment variable holding the RPC endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_env: Option<String>,
    /// Infura network name, e.g. `polygon-mainnet`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infura_network: Option<String>,
}

impl ChainConfig {
    /// Creates a chain with the default transfer gas limit and no endpoint sources.
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        symbol: impl Into<String>,
        chain_id: u64,
        strategy: FeeStrategy,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            symbol: symbol.into(),
            chain_id,
            price_symbol: None,
            strategy,
            native_gas_limit: NATIVE_TRANSFER_GAS,
            endpoint: None,
            rpc_env: None,
            infura_network: None,
        }
    }

    /// Sets the explicit endpoint.
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the endpoint environment variable.
    pub fn with_rpc_env(mut self, rpc_env: impl Into<String>) -> Self {
        self.rpc_env = Some(rpc_env.into());
        self
    }

    /// Sets the Infura network name.
    pub fn with_infura_network(mut self, network: impl Into<String>) -> Self {
        self.infura_network = Some(network.into());
        self
    }

    /// Sets the fiat quote symbol.
    pub fn with_price_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.price_symbol = Some(symbol.into());
        self
    }
}

/// A yield vault whose withdraw transaction is priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Unique key.
    pub key: String,
    /// Human readable name.
    pub display_name: String,
    /// Key of the chain the vault lives on.
    pub chain_key: String,
    /// Gas used by a withdraw.
    pub withdraw_gas_limit: u64,
    /// Platform, e.g. `beefy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Deposited token pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_pair: Option<String>,
    /// Vault strategy description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Static notes shown with the row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Withdraw transaction the gas limit was observed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_tx: Option<String>,
    /// When the reference transaction was observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_observed_at: Option<String>,
}

const fn default_native_gas_limit() -> u64 {
    NATIVE_TRANSFER_GAS
}

/// The chains tracked out of the box.
pub fn default_chains() -> Vec<ChainConfig> {
    vec![
        ChainConfig::new("ethereum", "Ethereum", "ETH", 1, FeeStrategy::Eip1559)
            .with_rpc_env("RPC_ETHEREUM_URL")
            .with_infura_network("mainnet"),
        ChainConfig::new("polygon", "Polygon PoS", "POL", 137, FeeStrategy::Eip1559)
            .with_rpc_env("RPC_POLYGON_URL")
            .with_infura_network("polygon-mainnet"),
        ChainConfig::new("arbitrum", "Arbitrum One", "ETH", 42161, FeeStrategy::Flat)
            .with_rpc_env("RPC_ARBITRUM_URL")
            .with_infura_network("arbitrum-mainnet"),
        ChainConfig::new("optimism", "OP Mainnet", "ETH", 10, FeeStrategy::RollupL1Inclusive)
            .with_rpc_env("RPC_OPTIMISM_URL")
            .with_infura_network("optimism-mainnet"),
        ChainConfig::new("avalanche", "Avalanche C-Chain", "AVAX", 43114, FeeStrategy::Eip1559)
            .with_rpc_env("RPC_AVALANCHE_URL")
            .with_infura_network("avalanche-mainnet"),
        ChainConfig::new("linea", "Linea", "ETH", 59144, FeeStrategy::NativeEstimate)
            .with_rpc_env("RPC_LINEA_URL")
            .with_infura_network("linea-mainnet"),
    ]
}
