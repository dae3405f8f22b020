//! Native transfer fee estimation.
//!
//! Every chain is estimated by the [`FeeStrategy`] it was registered with:
//! - [`eip1559`]: `baseFee + priority tip` sampled from `eth_feeHistory`
//! - [`op`]: L2 execution cost plus the L1 data fee of the OP stack gas price oracle
//! - [`flat`]: `eth_gasPrice × eth_estimateGas`
//! - [`linea`]: `linea_estimateGas` gas limit with the EIP-1559 gas price
//!
//! All amounts are integer wei. Strategies never substitute a zero fee; anything they cannot
//! compute is an [`EstimationError`].

use crate::{
    chains::{Chain, FeeStrategy},
    config::TransferTemplate,
    transport::{NO_PARAMS, RpcClient, RpcError},
};
use alloy::{
    primitives::{U64, U128, U256},
    rpc::types::TransactionRequest,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::instrument;

pub mod eip1559;
pub mod flat;
pub mod linea;
pub mod op;

/// How a fee was estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeeMode {
    /// EIP-1559 gas price with the configured transfer gas limit.
    Standard,
    /// EIP-1559 gas price with a live gas limit.
    Precise,
    /// `eth_gasPrice` because fee history was unavailable.
    Fallback,
    /// `eth_gasPrice` with a live gas limit.
    PreciseFallback,
    /// L2 execution plus L1 data fee.
    RollupL1Inclusive,
    /// `eth_gasPrice × eth_estimateGas`.
    Flat,
    /// Gas limit from the chain's own estimation method.
    NativeEstimate,
    /// Gas limit from the chain's own estimation method, `eth_gasPrice` as gas price.
    NativeEstimateFallback,
}

impl FeeMode {
    /// Returns the wire name of the mode.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Precise => "precise",
            Self::Fallback => "fallback",
            Self::PreciseFallback => "precise-fallback",
            Self::RollupL1Inclusive => "rollup-l1-inclusive",
            Self::Flat => "flat",
            Self::NativeEstimate => "native-estimate",
            Self::NativeEstimateFallback => "native-estimate-fallback",
        }
    }
}

impl fmt::Display for FeeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized fee of a native transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeEstimate {
    /// Effective gas price in wei.
    pub gas_price: u128,
    /// Gas limit of the transfer.
    pub gas_limit: u64,
    /// `gas_price × gas_limit` plus [`Self::l1_fee`].
    pub native_fee: u128,
    /// L1 data fee, for rollups.
    pub l1_fee: Option<u128>,
    /// How the fee was estimated.
    pub mode: FeeMode,
    /// Estimation notes.
    pub notes: Option<String>,
}

/// Errors of a fee estimation.
#[derive(Debug, Clone, Error)]
pub enum EstimationError {
    /// An upstream call failed and no fallback was left.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// The upstream answered with something no fee can be derived from.
    #[error("{reason}")]
    Invalid {
        /// Key of the chain.
        chain: String,
        /// What was wrong.
        reason: String,
    },
}

impl EstimationError {
    /// Creates an [`EstimationError::Invalid`].
    pub fn invalid(chain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid { chain: chain.into(), reason: reason.into() }
    }
}

/// Estimation settings shared by every chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    /// `eth_feeHistory` reward percentile.
    pub reward_percentile: f64,
    /// The transfer that is priced.
    pub template: TransferTemplate,
}

/// Estimates the native transfer fee of one chain.
#[derive(Debug, Clone)]
pub struct FeeEstimator {
    chain: String,
    chain_id: u64,
    strategy: FeeStrategy,
    native_gas_limit: u64,
    client: RpcClient,
    settings: EstimatorSettings,
}

impl FeeEstimator {
    /// Creates an estimator for `chain`.
    pub fn new(chain: &Chain, client: RpcClient, settings: EstimatorSettings) -> Self {
        Self {
            chain: chain.key().to_string(),
            chain_id: chain.chain_id(),
            strategy: chain.strategy(),
            native_gas_limit: chain.native_gas_limit(),
            client,
            settings,
        }
    }

    /// Key of the chain.
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Strategy the chain is estimated with.
    pub fn strategy(&self) -> FeeStrategy {
        self.strategy
    }

    /// Estimates the fee of the transfer template.
    ///
    /// `precise` asks for a live gas limit instead of the configured one; strategies that
    /// always estimate live ignore it.
    #[instrument(skip(self), fields(chain = %self.chain, strategy = %self.strategy))]
    pub async fn estimate(&self, precise: bool) -> Result<FeeEstimate, EstimationError> {
        match self.strategy {
            FeeStrategy::Eip1559 => eip1559::estimate(self, precise).await,
            FeeStrategy::RollupL1Inclusive => op::estimate(self).await,
            FeeStrategy::Flat => flat::estimate(self).await,
            FeeStrategy::NativeEstimate => linea::estimate(self, precise).await,
        }
    }

    /// The transfer template as a transaction request.
    pub fn transfer_request(&self) -> TransactionRequest {
        let template = self.settings.template;
        TransactionRequest::default()
            .from(template.from)
            .to(template.to)
            .value(U256::from(template.value))
    }

    /// `eth_gasPrice`.
    async fn gas_price(&self) -> Result<u128, RpcError> {
        let price: U128 = self.client.call("eth_gasPrice", NO_PARAMS).await?;
        Ok(price.to())
    }

    /// `eth_estimateGas` of the transfer template.
    async fn estimate_gas(&self) -> Result<u64, RpcError> {
        let gas: U64 = self.client.call("eth_estimateGas", (self.transfer_request(),)).await?;
        Ok(gas.to())
    }

    /// `gas_price × gas_limit + l1_fee`, checked.
    fn total_fee(
        &self,
        gas_price: u128,
        gas_limit: u64,
        l1_fee: Option<u128>,
    ) -> Result<u128, EstimationError> {
        gas_price
            .checked_mul(u128::from(gas_limit))
            .and_then(|fee| fee.checked_add(l1_fee.unwrap_or_default()))
            .ok_or_else(|| EstimationError::invalid(&self.chain, "fee overflows u128"))
    }
}
