//! Linea fee estimation.
//!
//! Linea nodes expose `linea_estimateGas`, which accounts for the chain's own gas accounting. The
//! gas limit is taken from it when available; the gas price always follows the EIP-1559 path.

use super::{
    EstimationError, FeeEstimate, FeeEstimator, FeeMode,
    eip1559::{self, GasPriceQuote},
};
use crate::types::join_notes;
use alloy::primitives::U64;
use serde::Deserialize;
use tracing::debug;

/// Result of `linea_estimateGas`. Only the gas limit is used.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineaGasEstimate {
    gas_limit: U64,
}

/// Estimates the fee with the `linea_estimateGas` gas limit and the EIP-1559 gas price.
pub(super) async fn estimate(
    estimator: &FeeEstimator,
    precise: bool,
) -> Result<FeeEstimate, EstimationError> {
    let (quote, native) = tokio::join!(eip1559::gas_price(estimator), native_gas_limit(estimator));
    let GasPriceQuote { gas_price, fallback, note } = quote?;

    let (gas_limit, mode, limit_note) = match native? {
        Some(gas_limit) => (gas_limit, native_mode(fallback), "gasLimit:linea_estimateGas"),
        None => {
            let gas_limit = eip1559::gas_limit(estimator, precise).await?;
            (gas_limit, eip1559::mode(precise, fallback), "linea_estimateGas unsupported")
        }
    };

    Ok(FeeEstimate {
        gas_price,
        gas_limit,
        native_fee: estimator.total_fee(gas_price, gas_limit, None)?,
        l1_fee: None,
        mode,
        notes: join_notes([Some(note.as_str()), Some(limit_note)]),
    })
}

/// Mode of an estimate whose gas limit came from `linea_estimateGas`.
const fn native_mode(fallback: bool) -> FeeMode {
    if fallback { FeeMode::NativeEstimateFallback } else { FeeMode::NativeEstimate }
}

/// `linea_estimateGas` of the transfer, or `None` if the node does not implement it.
async fn native_gas_limit(estimator: &FeeEstimator) -> Result<Option<u64>, EstimationError> {
    match estimator
        .client
        .call::<_, LineaGasEstimate>("linea_estimateGas", (estimator.transfer_request(),))
        .await
    {
        Ok(estimate) => Ok(Some(estimate.gas_limit.to())),
        Err(err) if err.is_method_not_found() => {
            debug!(chain = estimator.chain(), "linea_estimateGas not supported");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        estimation::tests::estimator,
        transport::mock::{MockReply, MockTransport},
    };
    use serde_json::json;

    fn fee_history() -> MockReply {
        MockReply::result(json!({
            "baseFeePerGas": ["0x7"],
            "reward": [["0x3b9aca00"]],
        }))
    }

    #[tokio::test]
    async fn uses_native_gas_limit() {
        let transport = MockTransport::new(|method, _| match method {
            "eth_feeHistory" => fee_history(),
            "linea_estimateGas" => MockReply::result(json!({
                "gasLimit": "0x5dc0",
                "baseFeePerGas": "0x7",
                "priorityFeePerGas": "0x1",
            })),
            _ => MockReply::method_not_found(),
        });

        let estimate = estimator("linea", &transport).estimate(false).await.unwrap();
        assert_eq!(estimate.gas_limit, 24_000);
        // the gas price is the eip1559 one, not linea's own suggestion
        assert_eq!(estimate.gas_price, 1_000_000_007);
        assert_eq!(estimate.native_fee, 1_000_000_007 * 24_000);
        assert_eq!(estimate.mode, FeeMode::NativeEstimate);
        assert_eq!(estimate.notes.as_deref(), Some("baseFee+priority, gasLimit:linea_estimateGas"));
    }

    #[tokio::test]
    async fn falls_back_on_method_not_found() {
        let transport = MockTransport::new(|method, _| match method {
            "eth_feeHistory" => fee_history(),
            "linea_estimateGas" => {
                MockReply::error(-32601, "the method linea_estimateGas does not exist")
            }
            _ => MockReply::method_not_found(),
        });

        let estimate = estimator("linea", &transport).estimate(false).await.unwrap();
        assert_eq!(estimate.gas_limit, 21_000);
        assert_eq!(estimate.gas_price, 1_000_000_007);
        assert_eq!(estimate.mode, FeeMode::Standard);
        assert_eq!(estimate.notes.as_deref(), Some("baseFee+priority, linea_estimateGas unsupported"));
    }

    #[tokio::test]
    async fn other_errors_are_not_masked() {
        let transport = MockTransport::new(|method, _| match method {
            "eth_feeHistory" => fee_history(),
            "linea_estimateGas" => MockReply::error(-32000, "execution reverted"),
            _ => MockReply::method_not_found(),
        });

        let err = estimator("linea", &transport).estimate(false).await.unwrap_err();
        assert_eq!(err.to_string(), "rpc error -32000: execution reverted");
    }

    #[tokio::test]
    async fn native_gas_limit_with_gas_price_fallback() {
        let transport = MockTransport::new(|method, _| match method {
            "eth_feeHistory" => MockReply::error(-32000, "fee history unavailable"),
            "eth_gasPrice" => MockReply::result(json!("0x3b9aca00")),
            "linea_estimateGas" => MockReply::result(json!({ "gasLimit": "0x5dc0" })),
            _ => MockReply::method_not_found(),
        });

        let estimate = estimator("linea", &transport).estimate(false).await.unwrap();
        assert_eq!(estimate.gas_limit, 24_000);
        assert_eq!(estimate.gas_price, 1_000_000_000);
        assert_eq!(estimate.mode, FeeMode::NativeEstimateFallback);
        assert_eq!(estimate.mode.to_string(), "native-estimate-fallback");
    }
}
