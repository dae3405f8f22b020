//! Flat gas price estimation.
//!
//! Chains like Arbitrum fold every surcharge into the gas price and the gas estimate, so the fee
//! is simply `eth_gasPrice × eth_estimateGas`.

use super::{EstimationError, FeeEstimate, FeeEstimator, FeeMode};

/// Estimates the fee as `eth_gasPrice × eth_estimateGas`.
pub(super) async fn estimate(estimator: &FeeEstimator) -> Result<FeeEstimate, EstimationError> {
    let (gas_price, gas_limit) =
        tokio::try_join!(estimator.gas_price(), estimator.estimate_gas())?;

    Ok(FeeEstimate {
        gas_price,
        gas_limit,
        native_fee: estimator.total_fee(gas_price, gas_limit, None)?,
        l1_fee: None,
        mode: FeeMode::Flat,
        notes: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        estimation::tests::estimator,
        transport::mock::{MockReply, MockTransport},
    };
    use serde_json::json;

    #[tokio::test]
    async fn gas_price_times_estimate() {
        let transport = MockTransport::new(|method, _| match method {
            "eth_gasPrice" => MockReply::result(json!("0x989680")), // 0.01 gwei
            "eth_estimateGas" => MockReply::result(json!("0x7530")), // 30_000
            _ => MockReply::method_not_found(),
        });

        // precise only matters for strategies with a configured gas limit
        let estimate = estimator("arbitrum", &transport).estimate(false).await.unwrap();
        assert_eq!(estimate.gas_price, 10_000_000);
        assert_eq!(estimate.gas_limit, 30_000);
        assert_eq!(estimate.native_fee, 300_000_000_000);
        assert_eq!(estimate.l1_fee, None);
        assert_eq!(estimate.mode, FeeMode::Flat);
        assert_eq!(transport.count("eth_feeHistory"), 0);
    }

    #[tokio::test]
    async fn failing_estimate_is_an_error() {
        let transport = MockTransport::new(|method, _| match method {
            "eth_gasPrice" => MockReply::result(json!("0x989680")),
            _ => MockReply::error(-32000, "insufficient funds for gas * price + value"),
        });

        let err = estimator("arbitrum", &transport).estimate(false).await.unwrap_err();
        assert!(matches!(err, EstimationError::Rpc(ref err) if err.method == "eth_estimateGas"));
    }
}
