//! Upstream JSON-RPC transport.
//!
//! Every chain gets its own [`RpcClient`]. All clients share one [`Semaphore`] which bounds the
//! number of concurrent outbound calls across the process; calls beyond the bound wait for a
//! permit instead of failing.

use alloy::{
    rpc::{
        client::{ClientBuilder, RpcClient as AlloyRpcClient},
        json_rpc::{RpcRecv, RpcSend},
    },
    transports::Transport,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

pub mod error;
pub use error::{RpcError, RpcErrorKind, TransportErrExt};

mod metrics;
use metrics::UpstreamCallMetrics;

pub mod timeout;
pub use timeout::TimeoutLayer;

#[cfg(test)]
pub(crate) mod mock;

/// Parameters of a method that takes none.
pub const NO_PARAMS: [(); 0] = [];

/// JSON-RPC client of a single chain.
#[derive(Debug, Clone)]
pub struct RpcClient {
    chain: Arc<str>,
    client: AlloyRpcClient,
    permits: Arc<Semaphore>,
}

impl RpcClient {
    /// Creates an HTTP client for the given chain.
    pub fn http(chain: &str, url: Url, timeout: Duration, permits: Arc<Semaphore>) -> Self {
        let client = ClientBuilder::default().layer(TimeoutLayer::new(timeout, chain)).http(url);
        Self { chain: chain.into(), client, permits }
    }

    /// Creates a client over an arbitrary alloy transport.
    pub fn with_transport<T>(
        chain: &str,
        transport: T,
        timeout: Duration,
        permits: Arc<Semaphore>,
    ) -> Self
    where
        T: Transport + Clone,
    {
        let client = ClientBuilder::default()
            .layer(TimeoutLayer::new(timeout, chain))
            .transport(transport, false);
        Self { chain: chain.into(), client, permits }
    }

    /// Key of the chain this client talks to.
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Calls `method` with `params`.
    ///
    /// Waits for an outbound permit first. There is no retry at this level.
    pub async fn call<P, R>(&self, method: &'static str, params: P) -> Result<R, RpcError>
    where
        P: RpcSend,
        R: RpcRecv,
    {
        let _permit = self.permits.acquire().await.map_err(|_| {
            RpcError::new(
                &*self.chain,
                method,
                RpcErrorKind::Transport("outbound connection pool closed".to_string()),
            )
        })?;

        let metrics = UpstreamCallMetrics::new_with_labels(&[
            ("chain", self.chain.to_string()),
            ("method", method.to_string()),
        ]);

        let start = Instant::now();
        let result = self.client.request(method, params).await;
        let elapsed = start.elapsed();

        metrics.calls.increment(1);
        metrics.latency.record(elapsed.as_secs_f64());

        match result {
            Ok(value) => {
                debug!(
                    chain = %self.chain,
                    method,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "RPC call succeeded"
                );
                Ok(value)
            }
            Err(err) => {
                let err = RpcError::from_transport(&self.chain, method, err);
                metrics.errors.increment(1);
                warn!(
                    chain = %self.chain,
                    method,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "RPC call failed"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        mock::{MockReply, MockTransport},
        *,
    };
    use alloy::primitives::U64;
    use serde_json::json;

    #[tokio::test]
    async fn decodes_result() {
        let transport = MockTransport::new(|method, _| match method {
            "eth_chainId" => MockReply::result(json!("0xa")),
            _ => MockReply::method_not_found(),
        });
        let client = transport.client("optimism");

        let chain_id: U64 = client.call("eth_chainId", NO_PARAMS).await.unwrap();
        assert_eq!(chain_id, U64::from(10));
        assert_eq!(transport.calls(), vec!["eth_chainId"]);
    }

    #[tokio::test]
    async fn classifies_method_not_found() {
        let transport = MockTransport::new(|_, _| MockReply::method_not_found());
        let client = transport.client("linea");

        let err = client.call::<_, U64>("linea_estimateGas", NO_PARAMS).await.unwrap_err();
        assert!(err.is_method_not_found());
        assert_eq!(err.chain, "linea");
        assert_eq!(err.method, "linea_estimateGas");
    }

    #[tokio::test]
    async fn malformed_result() {
        let transport = MockTransport::new(|_, _| MockReply::result(json!({ "not": "a number" })));
        let client = transport.client("ethereum");

        let err = client.call::<_, U64>("eth_gasPrice", NO_PARAMS).await.unwrap_err();
        assert!(matches!(err.kind, RpcErrorKind::Malformed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out() {
        let transport = MockTransport::new(|_, _| MockReply::Hang);
        let client = transport.client_with_timeout("optimism", Duration::from_secs(8));

        let start = tokio::time::Instant::now();
        let err = client.call::<_, U64>("eth_gasPrice", NO_PARAMS).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "request timed out");
        assert!(start.elapsed() >= Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn bounds_concurrent_calls() {
        let transport = MockTransport::new(|_, _| MockReply::Hang);
        let permits = Arc::new(Semaphore::new(1));
        let client =
            RpcClient::with_transport("ethereum", transport.clone(), Duration::from_secs(1), permits);

        let start = tokio::time::Instant::now();
        let (a, b) = tokio::join!(
            client.call::<_, U64>("eth_gasPrice", NO_PARAMS),
            client.call::<_, U64>("eth_gasPrice", NO_PARAMS),
        );
        assert!(a.unwrap_err().is_timeout());
        assert!(b.unwrap_err().is_timeout());

        // the second call waited for the first permit before its own timeout started
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(transport.calls().len(), 2);
    }
}
