//! Response types.

mod format;
pub use format::format_units_half_up;

use crate::{
    constants::{GWEI_DECIMALS, GWEI_DISPLAY_DIGITS, NATIVE_DECIMALS, NATIVE_DISPLAY_DIGITS},
    estimation::{FeeEstimate, FeeMode},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chain fields shown with every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Unique key.
    pub key: String,
    /// Human readable name.
    pub display_name: String,
    /// Native currency symbol.
    pub symbol: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
}

/// A gas price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPrice {
    /// Price per gas in wei.
    pub wei: u128,
    /// Price per gas in gwei, four fraction digits.
    pub gwei: String,
}

impl GasPrice {
    /// Creates a [`GasPrice`] from wei.
    pub fn from_wei(wei: u128) -> Self {
        Self { wei, gwei: format_units_half_up(wei, GWEI_DECIMALS, GWEI_DISPLAY_DIGITS) }
    }
}

/// An amount of the native currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeFee {
    /// Amount in wei.
    pub wei: u128,
    /// Amount in the native unit, eight fraction digits.
    pub formatted: String,
}

impl NativeFee {
    /// Creates a [`NativeFee`] from wei.
    pub fn from_wei(wei: u128) -> Self {
        Self { wei, formatted: format_units_half_up(wei, NATIVE_DECIMALS, NATIVE_DISPLAY_DIGITS) }
    }
}

/// A native fee converted to a fiat currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiatValue {
    /// Upper-cased currency code, e.g. `USD`.
    pub currency: String,
    /// Converted value.
    pub value: f64,
    /// Converted value with six fraction digits.
    pub formatted: String,
    /// Symbol the quote was looked up for.
    pub price_symbol: String,
}

/// Fee of a native transfer on one chain.
///
/// A row either carries an `error` and no fee fields, or a populated `native_fee`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRow {
    /// The chain.
    pub chain: ChainInfo,
    /// Symbol used for fiat quotes.
    pub price_symbol: String,
    /// Effective gas price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<GasPrice>,
    /// Gas limit of the transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Total fee of the transfer, including any L1 surcharge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_fee: Option<NativeFee>,
    /// L1 data fee part of [`Self::native_fee`], for rollups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l1_fee: Option<NativeFee>,
    /// Fee converted to each requested currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiat: Option<BTreeMap<String, FiatValue>>,
    /// Why the fiat conversion is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiat_error: Option<String>,
    /// How the fee was estimated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FeeMode>,
    /// Estimation and cache notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Why no fee could be estimated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the row is an expired value served because its refresh failed.
    #[serde(default)]
    pub stale: bool,
    /// When the estimate was fetched, in epoch seconds.
    pub fetched_at: u64,
}

impl FeeRow {
    /// A row for a successful estimate.
    pub fn populated(
        chain: ChainInfo,
        price_symbol: String,
        estimate: &FeeEstimate,
        stale: bool,
        fetched_at: u64,
        cache_note: Option<String>,
    ) -> Self {
        Self {
            chain,
            price_symbol,
            gas_price: Some(GasPrice::from_wei(estimate.gas_price)),
            gas_limit: Some(estimate.gas_limit),
            native_fee: Some(NativeFee::from_wei(estimate.native_fee)),
            l1_fee: estimate.l1_fee.map(NativeFee::from_wei),
            fiat: None,
            fiat_error: None,
            mode: Some(estimate.mode),
            notes: join_notes([estimate.notes.as_deref(), cache_note.as_deref()]),
            error: None,
            stale,
            fetched_at,
        }
    }

    /// A row for a chain whose fee could not be estimated.
    pub fn failed(
        chain: ChainInfo,
        price_symbol: String,
        error: impl Into<String>,
        fetched_at: u64,
    ) -> Self {
        Self {
            chain,
            price_symbol,
            gas_price: None,
            gas_limit: None,
            native_fee: None,
            l1_fee: None,
            fiat: None,
            fiat_error: None,
            mode: None,
            notes: None,
            error: Some(error.into()),
            stale: false,
            fetched_at,
        }
    }

    /// Whether the row carries a fee.
    pub fn is_populated(&self) -> bool {
        self.error.is_none() && self.native_fee.is_some()
    }
}

/// Metadata of a [`FeesResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeesMeta {
    /// When the response was assembled, in epoch seconds.
    pub generated_at: u64,
    /// Lifetime of cached estimates.
    pub cache_ttl_seconds: u64,
    /// Whether the request asked for live gas limits.
    pub precise_requested: bool,
    /// Whether live gas limits are enabled on this server.
    pub precise_enabled: bool,
    /// Fiat currencies the fees were converted to.
    #[serde(default)]
    pub currencies: Vec<String>,
}

/// Fees of every tracked chain, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeesResponse {
    /// Response metadata.
    pub meta: FeesMeta,
    /// One row per chain.
    pub data: Vec<FeeRow>,
}

/// Descriptive fields of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInfo {
    /// Unique key.
    pub key: String,
    /// Human readable name.
    pub display_name: String,
    /// Platform, e.g. `beefy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Deposited token pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_pair: Option<String>,
    /// Vault strategy description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// Where a vault's withdraw gas figure comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultReference {
    /// Gas used by the reference withdraw.
    pub gas_used: u64,
    /// Reference transaction hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// When the reference transaction was observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<String>,
}

/// Cost of withdrawing from a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRow {
    /// The vault.
    pub vault: VaultInfo,
    /// The chain the vault lives on.
    pub chain: ChainInfo,
    /// Gas used by a withdraw.
    pub gas_limit: u64,
    /// Gas price of the chain.
    #[serde(default)]
    pub gas_price: Option<GasPrice>,
    /// Fee of a withdraw.
    #[serde(default)]
    pub native_fee: Option<NativeFee>,
    /// How the chain gas price was estimated.
    #[serde(default)]
    pub mode: Option<FeeMode>,
    /// Vault and chain notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Why no fee could be computed.
    #[serde(default)]
    pub error: Option<String>,
    /// Whether the chain gas price is stale.
    #[serde(default)]
    pub stale: bool,
    /// When the chain gas price was fetched, in epoch seconds.
    pub fetched_at: u64,
    /// The reference withdraw.
    pub reference: VaultReference,
    /// Symbol used for fiat quotes, unset when the chain is unknown.
    #[serde(default)]
    pub price_symbol: Option<String>,
}

/// Joins the non-empty notes with `, `.
pub fn join_notes<'a>(notes: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    let notes: Vec<&str> = notes.into_iter().flatten().filter(|note| !note.is_empty()).collect();
    (!notes.is_empty()).then(|| notes.join(", "))
}
