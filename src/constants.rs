//! Gasboard constants.

use alloy::primitives::{Address, address};
use std::time::Duration;

/// Gas used by a plain native-value transfer.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Number of blocks requested from `eth_feeHistory`.
pub const FEE_HISTORY_BLOCK_COUNT: u64 = 5;

/// Default reward percentile requested from `eth_feeHistory`.
///
/// The median tip of the sampled blocks, which roughly corresponds to a "medium" priority.
pub const DEFAULT_REWARD_PERCENTILE: f64 = 50.0;

/// Default lifetime of a cached fee estimate.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Shortest allowed lifetime of a cached fee estimate.
pub const MIN_CACHE_TTL: Duration = Duration::from_secs(5);

/// Default lifetime of a cached fiat quote.
pub const DEFAULT_PRICE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Shortest allowed lifetime of a cached fiat quote.
pub const MIN_PRICE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Default upstream RPC request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(8);

/// Default number of concurrent outbound RPC calls.
pub const DEFAULT_MAX_OUTBOUND_CONNECTIONS: usize = 12;

/// Default number of inbound connections the server accepts.
pub const DEFAULT_RPC_MAX_CONNECTIONS: u32 = 1_000;

/// Default port of the fees server.
pub const DEFAULT_PORT: u16 = 9119;

/// Default sender of the estimation transfer template.
pub const DEFAULT_ESTIMATE_FROM: Address = address!("0x000000000000000000000000000000000000dEaD");

/// Default recipient of the estimation transfer template.
pub const DEFAULT_ESTIMATE_TO: Address = address!("0x000000000000000000000000000000000000bEEF");

/// Default value, in wei, of the estimation transfer template.
pub const DEFAULT_ESTIMATE_VALUE_WEI: u64 = 1;

/// Address of the OP stack `GasPriceOracle` predeploy.
pub const OP_GAS_PRICE_ORACLE: Address = address!("0x420000000000000000000000000000000000000F");

/// Default CoinMarketCap quotes endpoint.
pub const COINMARKETCAP_QUOTES_URL: &str =
    "https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest";

/// Maximum number of fiat quotes kept in memory.
pub const MAX_CACHED_QUOTES: u64 = 1_024;

/// Decimals between wei and gwei.
pub const GWEI_DECIMALS: u32 = 9;

/// Decimals between wei and the native unit.
pub const NATIVE_DECIMALS: u32 = 18;

/// Fraction digits of a formatted gwei value.
pub const GWEI_DISPLAY_DIGITS: u32 = 4;

/// Fraction digits of a formatted native value.
pub const NATIVE_DISPLAY_DIGITS: u32 = 8;

/// Fraction digits of a formatted fiat value.
pub const FIAT_DISPLAY_DIGITS: u32 = 6;

/// Maximum number of fiat currencies a single request may ask for.
pub const MAX_REQUESTED_CURRENCIES: usize = 8;
