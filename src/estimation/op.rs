//! OP Stack fee estimation.
//!
//! The fee of an OP Stack transaction is the L2 execution cost plus the L1 data fee the
//! sequencer charges for posting the transaction to L1. The latter is quoted by the
//! `GasPriceOracle` predeploy for an encoded transaction.

use super::{EstimationError, FeeEstimate, FeeEstimator, FeeMode};
use crate::{
    constants::OP_GAS_PRICE_ORACLE,
    transport::{RpcError, RpcErrorKind},
};
use alloy::{
    consensus::{SignableTransaction, TxEip1559},
    eips::BlockNumberOrTag,
    primitives::{Bytes, Signature, U256},
    rpc::types::TransactionRequest,
    sol,
    sol_types::{SolCall, SolValue},
};

sol! {
    contract GasPriceOracle {
        /// Computes the L1 portion of the fee based on the provided unsigned encoded transaction.
        ///
        /// See also: <https://github.com/ethereum-optimism/optimism/blob/8d85a214e50941793c806a731de5ecc0ad065b2f/packages/contracts-bedrock/src/L2/GasPriceOracle.sol#L57-L68>
        function getL1Fee(bytes memory _data) external view returns (uint256);
    }
}

/// Estimates the L2 execution cost plus the L1 data fee.
pub(super) async fn estimate(estimator: &FeeEstimator) -> Result<FeeEstimate, EstimationError> {
    let (gas_price, gas_limit, l1_fee) =
        tokio::try_join!(estimator.gas_price(), estimator.estimate_gas(), l1_fee(estimator))?;

    let l1_fee = u128::try_from(l1_fee)
        .map_err(|_| EstimationError::invalid(estimator.chain(), "l1 fee overflows u128"))?;

    Ok(FeeEstimate {
        gas_price,
        gas_limit,
        native_fee: estimator.total_fee(gas_price, gas_limit, Some(l1_fee))?,
        l1_fee: Some(l1_fee),
        mode: FeeMode::RollupL1Inclusive,
        notes: Some("l2 execution + l1 data fee".to_string()),
    })
}

/// Quotes the L1 data fee of the transfer through `GasPriceOracle.getL1Fee`.
async fn l1_fee(estimator: &FeeEstimator) -> Result<U256, RpcError> {
    let call = GasPriceOracle::getL1FeeCall { _data: encoded_transfer(estimator) };
    let request = TransactionRequest::default()
        .to(OP_GAS_PRICE_ORACLE)
        .input(Bytes::from(call.abi_encode()).into());

    let output: Bytes =
        estimator.client.call("eth_call", (request, BlockNumberOrTag::Latest)).await?;

    U256::abi_decode(&output).map_err(|err| {
        RpcError::new(
            estimator.chain(),
            "eth_call",
            RpcErrorKind::Malformed(format!("getL1Fee output: {err}")),
        )
    })
}

/// The transfer as a signed EIP-1559 transaction with every field at its maximum.
///
/// The oracle prices the compressed size of the payload, so maximal fields give an upper bound.
fn encoded_transfer(estimator: &FeeEstimator) -> Bytes {
    let template = estimator.settings.template;
    let tx = TxEip1559 {
        chain_id: estimator.chain_id,
        nonce: u64::MAX,
        gas_limit: u64::MAX,
        max_fee_per_gas: u128::MAX,
        max_priority_fee_per_gas: u128::MAX,
        to: template.to.into(),
        value: U256::from(template.value),
        ..Default::default()
    };
    let signature = Signature::new(U256::MAX, U256::MAX, true);

    let tx = tx.into_signed(signature);
    let mut buf = Vec::with_capacity(tx.eip2718_encoded_length());
    tx.eip2718_encode(&mut buf);
    buf.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        estimation::tests::estimator,
        transport::mock::{MockReply, MockTransport},
    };
    use alloy::{hex, primitives::Address};
    use serde_json::json;

    #[tokio::test]
    async fn l2_plus_l1_fee() {
        let transport = MockTransport::new(|method, params| match method {
            "eth_gasPrice" => MockReply::result(json!("0xf4240")), // 0.001 gwei
            "eth_estimateGas" => MockReply::result(json!("0x5208")),
            "eth_call" => {
                let to: Address = params[0]["to"].as_str().unwrap().parse().unwrap();
                assert_eq!(to, OP_GAS_PRICE_ORACLE);
                assert_eq!(params[1], "latest");

                let input = params[0]["input"].as_str().unwrap();
                let input = hex::decode(input).unwrap();
                assert_eq!(input[..4], GasPriceOracle::getL1FeeCall::SELECTOR);

                let fee = U256::from(5_000_000_000_000u64);
                MockReply::result(json!(Bytes::from(fee.abi_encode())))
            }
            _ => MockReply::method_not_found(),
        });

        let estimate = estimator("optimism", &transport).estimate(false).await.unwrap();
        assert_eq!(estimate.gas_price, 1_000_000);
        assert_eq!(estimate.gas_limit, 21_000);
        assert_eq!(estimate.l1_fee, Some(5_000_000_000_000));
        assert_eq!(estimate.native_fee, 21_000_000_000 + 5_000_000_000_000);
        assert_eq!(estimate.mode, FeeMode::RollupL1Inclusive);
    }

    #[tokio::test]
    async fn oracle_failure_is_an_error() {
        let transport = MockTransport::new(|method, _| match method {
            "eth_gasPrice" => MockReply::result(json!("0xf4240")),
            "eth_estimateGas" => MockReply::result(json!("0x5208")),
            "eth_call" => MockReply::result(json!("0x")),
            _ => MockReply::method_not_found(),
        });

        let err = estimator("optimism", &transport).estimate(false).await.unwrap_err();
        assert!(err.to_string().starts_with("malformed response: getL1Fee output"));
    }

    #[test]
    fn encoded_transfer_is_a_typed_transaction() {
        let transport = MockTransport::new(|_, _| MockReply::method_not_found());
        let encoded = encoded_transfer(&estimator("optimism", &transport));
        // EIP-1559 type byte
        assert_eq!(encoded[0], 0x02);
    }
}
