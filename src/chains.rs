//! Chain registry.
//!
//! The registry is built once at startup from [`ChainConfig`]s and never changes afterwards. Its
//! order is the order of the rows in every response.

use crate::{config::ChainConfig, types::ChainInfo};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use url::Url;

/// Environment variable holding the Infura project id.
pub const INFURA_PROJECT_ID_ENV: &str = "INFURA_PROJECT_ID";

/// How the native transfer fee of a chain is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeeStrategy {
    /// `baseFee + priority tip` from `eth_feeHistory`.
    Eip1559,
    /// L2 execution cost plus the L1 data fee reported by the OP stack gas price oracle.
    RollupL1Inclusive,
    /// `eth_gasPrice × eth_estimateGas`, for chains whose gas price already includes every
    /// surcharge.
    #[serde(alias = "buffered")]
    Flat,
    /// Gas limit from `linea_estimateGas` when the node supports it, EIP-1559 gas price.
    NativeEstimate,
}

impl FeeStrategy {
    /// Returns the wire name of the strategy.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eip1559 => "eip1559",
            Self::RollupL1Inclusive => "rollup-l1-inclusive",
            Self::Flat => "flat",
            Self::NativeEstimate => "native-estimate",
        }
    }
}

impl fmt::Display for FeeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked chain with its endpoint resolved.
#[derive(Debug, Clone)]
pub struct Chain {
    config: ChainConfig,
    endpoint: Result<Url, String>,
}

impl Chain {
    /// Resolves the endpoint of `config`.
    ///
    /// Sources are tried in order: the explicit `endpoint`, the `rpc_env` environment variable
    /// and finally Infura. A chain without any source is still registered; its rows carry the
    /// resolution error. A source that is set but not a valid URL is a configuration error.
    pub fn resolve(
        config: ChainConfig,
        env: impl Fn(&str) -> Option<String>,
        infura_project_id: Option<&str>,
    ) -> eyre::Result<Self> {
        let from_env = config
            .rpc_env
            .as_deref()
            .and_then(|name| env(name).map(|url| (name, url)))
            .filter(|(_, url)| !url.trim().is_empty());

        let endpoint = if let Some(endpoint) = &config.endpoint {
            Ok(endpoint.clone())
        } else if let Some((name, url)) = from_env {
            Ok(Url::parse(url.trim())
                .wrap_err_with(|| format!("chain '{}': invalid url in {name}", config.key))?)
        } else if let (Some(project_id), Some(network)) =
            (infura_project_id.filter(|id| !id.is_empty()), config.infura_network.as_deref())
        {
            Ok(Url::parse(&format!("https://{network}.infura.io/v3/{project_id}"))
                .wrap_err_with(|| format!("chain '{}': invalid infura network", config.key))?)
        } else {
            let source = config.rpc_env.as_deref().unwrap_or("an endpoint");
            Err(format!("RPC endpoint missing. Set {source} or {INFURA_PROJECT_ID_ENV}."))
        };

        Ok(Self { config, endpoint })
    }

    /// Unique key of the chain.
    pub fn key(&self) -> &str {
        &self.config.key
    }

    /// Human readable name.
    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    /// Native currency symbol.
    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// EIP-155 chain id.
    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Upper-cased symbol used for fiat quotes.
    pub fn price_symbol(&self) -> String {
        self.config.price_symbol.as_deref().unwrap_or(&self.config.symbol).to_uppercase()
    }

    /// Fee estimation strategy.
    pub fn strategy(&self) -> FeeStrategy {
        self.config.strategy
    }

    /// Gas limit of a native transfer.
    pub fn native_gas_limit(&self) -> u64 {
        self.config.native_gas_limit
    }

    /// The resolved endpoint, or why none could be resolved.
    pub fn endpoint(&self) -> Result<&Url, &str> {
        self.endpoint.as_ref().map_err(String::as_str)
    }

    /// Chain fields shown with every row.
    pub fn info(&self) -> ChainInfo {
        ChainInfo {
            key: self.config.key.clone(),
            display_name: self.config.display_name.clone(),
            symbol: self.config.symbol.clone(),
            chain_id: self.config.chain_id,
        }
    }
}

/// Ordered set of tracked chains.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Arc<Vec<Chain>>,
}

impl ChainRegistry {
    /// Builds the registry, resolving endpoints from the process environment.
    pub fn from_env(configs: Vec<ChainConfig>, infura_project_id: Option<&str>) -> eyre::Result<Self> {
        let infura_project_id = infura_project_id
            .map(str::to_string)
            .or_else(|| std::env::var(INFURA_PROJECT_ID_ENV).ok());
        Self::resolve(configs, |name| std::env::var(name).ok(), infura_project_id.as_deref())
    }

    /// Builds the registry with a custom environment lookup.
    pub fn resolve(
        configs: Vec<ChainConfig>,
        env: impl Fn(&str) -> Option<String>,
        infura_project_id: Option<&str>,
    ) -> eyre::Result<Self> {
        let chains = configs
            .into_iter()
            .map(|config| Chain::resolve(config, &env, infura_project_id))
            .collect::<eyre::Result<Vec<_>>>()?;
        Ok(Self { chains: Arc::new(chains) })
    }

    /// Iterates the chains in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Chain> {
        self.chains.iter()
    }

    /// Looks up a chain by key.
    pub fn get(&self, key: &str) -> Option<&Chain> {
        self.chains.iter().find(|chain| chain.key() == key)
    }

    /// Number of chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether no chain is tracked.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
