//! Timeout layer for upstream RPC requests.

use alloy::{
    rpc::json_rpc::{RequestPacket, ResponsePacket},
    transports::{Transport, TransportError, TransportErrorKind, TransportFut},
};
use futures_util::FutureExt;
use std::{
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::warn;

/// The error a [`TimeoutService`] fails with once the deadline passes.
///
/// Wrapped into [`TransportErrorKind::Custom`] and recognized again by
/// [`TransportErrExt::is_timeout`](super::error::TransportErrExt::is_timeout).
#[derive(Debug, Error)]
#[error("request timeout: chain={chain}, method={method}")]
pub struct RequestTimeout {
    /// Key of the chain.
    pub chain: String,
    /// The JSON-RPC method.
    pub method: String,
}

/// A [`tower::Layer`] that adds a timeout to requests.
#[derive(Debug, Clone)]
pub struct TimeoutLayer {
    timeout: Duration,
    chain: Arc<str>,
}

impl TimeoutLayer {
    /// Create a new [`TimeoutLayer`] with the given timeout duration and chain key.
    pub fn new(timeout: Duration, chain: impl Into<Arc<str>>) -> Self {
        Self { timeout, chain: chain.into() }
    }
}

impl<T> Layer<T> for TimeoutLayer {
    type Service = TimeoutService<T>;

    fn layer(&self, inner: T) -> Self::Service {
        TimeoutService { inner, timeout: self.timeout, chain: self.chain.clone() }
    }
}

/// A service that wraps another service with a timeout.
#[derive(Debug, Clone)]
pub struct TimeoutService<T> {
    inner: T,
    timeout: Duration,
    chain: Arc<str>,
}

impl<T> Service<RequestPacket> for TimeoutService<T>
where
    T: Transport + Clone,
{
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RequestPacket) -> Self::Future {
        let method = req.as_single().map(|r| r.method()).unwrap_or("batch").to_string();

        let fut = self.inner.call(req);
        let timeout = self.timeout;
        let chain = self.chain.clone();

        async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        %chain,
                        %method,
                        timeout_ms = timeout.as_millis() as u64,
                        "RPC request timeout"
                    );
                    Err(TransportErrorKind::custom(RequestTimeout {
                        chain: chain.to_string(),
                        method,
                    }))
                }
            }
        }
        .boxed()
    }
}
