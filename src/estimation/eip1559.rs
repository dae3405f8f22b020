//! EIP-1559 fee estimation from `eth_feeHistory`.
//!
//! The effective gas price is the base fee of the latest block plus the median priority tip the
//! sampled blocks paid at the configured reward percentile. When fee history has no usable reward
//! data the tip comes from `eth_maxPriorityFeePerGas`; when fee history itself is unavailable the
//! node's `eth_gasPrice` is used as is.

use super::{EstimationError, FeeEstimate, FeeEstimator, FeeMode};
use crate::{
    constants::FEE_HISTORY_BLOCK_COUNT,
    transport::{NO_PARAMS, RpcError},
    types::join_notes,
};
use alloy::{
    eips::BlockNumberOrTag,
    primitives::{U64, U128},
};
use serde_json::Value;
use tracing::warn;

/// A gas price with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPriceQuote {
    /// Effective gas price in wei.
    pub gas_price: u128,
    /// Whether the price came from `eth_gasPrice` instead of fee history.
    pub fallback: bool,
    /// How the price was derived.
    pub note: String,
}

/// Why the reward column of a fee history cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardUnavailable {
    /// No reward data was returned.
    Empty,
    /// Reward data was returned but is not a list of quantity lists.
    Malformed(String),
}

/// Estimates the fee with the EIP-1559 gas price.
pub(super) async fn estimate(
    estimator: &FeeEstimator,
    precise: bool,
) -> Result<FeeEstimate, EstimationError> {
    let quote = gas_price(estimator).await?;
    let gas_limit = gas_limit(estimator, precise).await?;

    Ok(FeeEstimate {
        gas_price: quote.gas_price,
        gas_limit,
        native_fee: estimator.total_fee(quote.gas_price, gas_limit, None)?,
        l1_fee: None,
        mode: mode(precise, quote.fallback),
        notes: join_notes([Some(quote.note.as_str())]),
    })
}

/// Mode of an estimate priced by this strategy.
pub(super) const fn mode(precise: bool, fallback: bool) -> FeeMode {
    match (precise, fallback) {
        (false, false) => FeeMode::Standard,
        (true, false) => FeeMode::Precise,
        (false, true) => FeeMode::Fallback,
        (true, true) => FeeMode::PreciseFallback,
    }
}

/// Gas limit of the transfer: live in precise mode, the configured one otherwise.
pub(super) async fn gas_limit(
    estimator: &FeeEstimator,
    precise: bool,
) -> Result<u64, EstimationError> {
    if precise {
        Ok(estimator.estimate_gas().await?)
    } else {
        Ok(estimator.native_gas_limit)
    }
}

/// Computes the effective EIP-1559 gas price.
pub(super) async fn gas_price(estimator: &FeeEstimator) -> Result<GasPriceQuote, EstimationError> {
    let chain = estimator.chain();
    let history: Result<Value, RpcError> = estimator
        .client
        .call(
            "eth_feeHistory",
            (
                U64::from(FEE_HISTORY_BLOCK_COUNT),
                BlockNumberOrTag::Latest,
                [estimator.settings.reward_percentile],
            ),
        )
        .await;

    let (history, base_fee) = match history {
        Ok(history) => match latest_base_fee(&history) {
            Some(base_fee) => (history, base_fee),
            None => {
                warn!(chain, "Fee history has no base fee");
                return fallback_gas_price(estimator, "no base fee").await;
            }
        },
        Err(err) => return fallback_gas_price(estimator, &err.to_string()).await,
    };

    let (priority_fee, note) = match median_reward(&history) {
        Ok(tip) => (tip, "baseFee+priority"),
        Err(reason) => {
            if let RewardUnavailable::Malformed(err) = &reason {
                warn!(chain, %err, "Malformed fee history rewards");
            }

            match estimator.client.call::<_, U128>("eth_maxPriorityFeePerGas", NO_PARAMS).await {
                Ok(tip) => (tip.to::<u128>(), "baseFee+maxPriorityFeePerGas"),
                Err(err) => {
                    return Err(EstimationError::invalid(
                        chain,
                        format!("priority fee unavailable: no fee history rewards and {err}"),
                    ));
                }
            }
        }
    };

    let gas_price = base_fee
        .checked_add(priority_fee)
        .ok_or_else(|| EstimationError::invalid(chain, "gas price overflows u128"))?;

    Ok(GasPriceQuote { gas_price, fallback: false, note: note.to_string() })
}

async fn fallback_gas_price(
    estimator: &FeeEstimator,
    reason: &str,
) -> Result<GasPriceQuote, EstimationError> {
    let gas_price = estimator.gas_price().await?;
    Ok(GasPriceQuote { gas_price, fallback: true, note: format!("fallback:eth_gasPrice ({reason})") })
}

/// Base fee of the latest block in a fee history response.
pub fn latest_base_fee(history: &Value) -> Option<u128> {
    let base_fees = history.get("baseFeePerGas")?;
    let base_fees: Vec<U128> = serde_json::from_value(base_fees.clone()).ok()?;
    base_fees.last().map(|fee| fee.to())
}

/// Median of the per-block rewards at the requested percentile.
///
/// Only one percentile is requested, so each block contributes the first entry of its row.
pub fn median_reward(history: &Value) -> Result<u128, RewardUnavailable> {
    let rows = match history.get("reward") {
        None | Some(Value::Null) => return Err(RewardUnavailable::Empty),
        Some(rows) => serde_json::from_value::<Vec<Vec<U128>>>(rows.clone())
            .map_err(|err| RewardUnavailable::Malformed(err.to_string()))?,
    };

    let mut rewards = rows
        .iter()
        .map(|row| row.first().map(|reward| reward.to::<u128>()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| RewardUnavailable::Malformed("percentile column missing".to_string()))?;

    if rewards.is_empty() {
        return Err(RewardUnavailable::Empty);
    }

    rewards.sort_unstable();
    let mid = rewards.len() / 2;
    if rewards.len() % 2 == 1 {
        Ok(rewards[mid])
    } else {
        let (a, b) = (rewards[mid - 1], rewards[mid]);
        Ok(a / 2 + b / 2 + (a % 2 + b % 2) / 2)
    }
}
