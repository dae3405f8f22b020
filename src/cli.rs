//! # Gasboard CLI
use crate::{config::GasboardConfig, spawn::try_spawn_with_args};
use clap::Parser;
use std::{net::IpAddr, path::PathBuf, time::Duration};

/// Gasboard serves native transfer fees of the tracked EVM chains.
///
/// Settings given on the command line override the ones in the configuration file.
#[derive(Debug, Parser)]
#[command(author, about = "Gasboard", long_about = None)]
pub struct Args {
    /// The configuration file.
    ///
    /// If missing, a default one will be used and stored in the working directory under
    /// `gasboard.yaml`.
    #[arg(long, value_name = "CONFIG", env = "GASBOARD_CONFIG", default_value = "gasboard.yaml")]
    pub config: PathBuf,
    /// The address to serve the RPC on.
    #[arg(long = "http.addr", value_name = "ADDR")]
    pub address: Option<IpAddr>,
    /// The port to serve the RPC on.
    #[arg(long = "http.port", value_name = "PORT")]
    pub port: Option<u16>,
    /// The maximum number of concurrent RPC connections.
    #[arg(long = "http.max-connections", value_name = "COUNT")]
    pub max_connections: Option<u32>,
    /// How long a fee estimate is served from cache, in seconds.
    #[arg(long = "fees.cache-ttl", value_name = "SECONDS", value_parser = parse_duration_secs)]
    pub cache_ttl: Option<Duration>,
    /// Whether callers may request live gas limits.
    #[arg(long = "fees.precise-mode", value_name = "BOOL")]
    pub precise_mode: Option<bool>,
    /// The `eth_feeHistory` reward percentile used for the priority fee.
    #[arg(long = "fees.reward-percentile", value_name = "PERCENTILE")]
    pub reward_percentile: Option<f64>,
    /// Timeout of a single upstream RPC request, in seconds.
    #[arg(long = "upstream.timeout", value_name = "SECONDS", value_parser = parse_duration_secs)]
    pub http_timeout: Option<Duration>,
    /// The maximum number of in-flight upstream RPC requests.
    #[arg(long = "upstream.max-connections", value_name = "COUNT")]
    pub max_outbound_connections: Option<usize>,
    /// How long a fiat quote is served from cache, in seconds.
    #[arg(long = "pricefeed.cache-ttl", value_name = "SECONDS", value_parser = parse_duration_secs)]
    pub price_cache_ttl: Option<Duration>,
    /// A constant fiat rate for every quote. Used for testing.
    #[arg(long = "pricefeed.constant-rate", value_name = "RATE")]
    pub constant_rate: Option<f64>,
    /// The Infura project id used for chains without an explicit endpoint.
    #[arg(long = "infura-project-id", env = "INFURA_PROJECT_ID", value_name = "ID")]
    pub infura_project_id: Option<String>,
    /// The CoinMarketCap API key used for fiat quotes.
    #[arg(long = "coinmarketcap-api-key", env = "COINMARKETCAP_API_KEY", value_name = "KEY")]
    pub coinmarketcap_api_key: Option<String>,
}

impl Args {
    /// Run gasboard.
    pub async fn run(self) -> eyre::Result<()> {
        let config_path = self.config.clone();
        try_spawn_with_args(self, &config_path).await?.server.stopped().await;

        Ok(())
    }

    /// Merges the [`Args`] values that were given into an existing [`GasboardConfig`].
    pub fn merge_config(self, config: GasboardConfig) -> GasboardConfig {
        config
            .merge(self.address, GasboardConfig::with_address)
            .merge(self.port, GasboardConfig::with_port)
            .merge(self.max_connections, GasboardConfig::with_max_connections)
            .merge(self.cache_ttl, GasboardConfig::with_cache_ttl)
            .merge(self.precise_mode, GasboardConfig::with_precise_mode)
            .merge(self.reward_percentile, GasboardConfig::with_reward_percentile)
            .merge(self.http_timeout, GasboardConfig::with_http_timeout)
            .merge(self.max_outbound_connections, GasboardConfig::with_max_outbound_connections)
            .merge(self.price_cache_ttl, GasboardConfig::with_price_cache_ttl)
            .with_constant_rate(self.constant_rate)
            .with_infura_project_id(self.infura_project_id)
            .with_coinmarketcap_api_key(self.coinmarketcap_api_key)
    }
}

trait Merge: Sized {
    /// Applies `set` if a value was given.
    fn merge<T>(self, value: Option<T>, set: impl FnOnce(Self, T) -> Self) -> Self {
        match value {
            Some(value) => set(self, value),
            None => self,
        }
    }
}

impl Merge for GasboardConfig {}

/// Parses a string representing seconds to a [`Duration`].
fn parse_duration_secs(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let seconds = arg.parse()?;
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn overrides_only_given_values() {
        let args = Args::parse_from([
            "gasboard",
            "--http.port",
            "8080",
            "--fees.cache-ttl",
            "30",
            "--pricefeed.constant-rate",
            "2.5",
        ]);
        let base = GasboardConfig::default()
            .with_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .with_precise_mode(true);

        let config = args.merge_config(base);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.fees.cache_ttl, Duration::from_secs(30));
        assert!(config.fees.precise_mode);
        assert_eq!(config.pricefeed.constant_rate, Some(2.5));
    }

    #[test]
    fn rejects_fractional_seconds() {
        assert!(parse_duration_secs("1.5").is_err());
        assert_eq!(parse_duration_secs("12").unwrap(), Duration::from_secs(12));
    }
}
