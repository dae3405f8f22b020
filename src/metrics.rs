//! Prometheus exporter and the server's metrics middlewares.

use std::{future::Future, pin::Pin, sync::OnceLock, time::Duration};

use futures_util::{FutureExt, TryFutureExt, future::BoxFuture};
use jsonrpsee::{
    MethodResponse,
    server::{HttpBody, HttpRequest, HttpResponse, middleware::rpc::RpcServiceT},
    types::Request,
};
use metrics::{Counter, Histogram};
use metrics_derive::Metrics;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::time::Instant;
use tower::Service;
use tower_http::BoxError;
use tracing::warn;

/// Path the exporter renders at.
pub const METRICS_PATH: &str = "/metrics";

static EXPORTER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Returns the handle of the process wide Prometheus exporter, installing it on first use.
///
/// The recorder performs upkeep every 5 seconds. Must be called from within a tokio runtime.
pub fn build_exporter() -> PrometheusHandle {
    EXPORTER
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();

            let recorder_handle = handle.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    recorder_handle.run_upkeep();
                }
            });

            if let Err(err) = metrics::set_global_recorder(recorder) {
                warn!(%err, "Metrics recorder already installed");
            }

            handle
        })
        .clone()
}

/// A Tower service that renders Prometheus metrics at [`METRICS_PATH`].
#[derive(Clone)]
#[must_use]
pub struct MetricsService<S> {
    inner: S,
    recorder: PrometheusHandle,
}

impl<S> MetricsService<S> {
    /// Create a new metrics service with the given recorder handle.
    pub fn new(inner: S, recorder: PrometheusHandle) -> Self {
        Self { inner, recorder }
    }
}

impl<S, B> Service<HttpRequest<B>> for MetricsService<S>
where
    S: Service<HttpRequest, Response = HttpResponse>,
    S::Response: 'static,
    S::Error: Into<BoxError> + 'static,
    S::Future: Send + 'static,
    B: http_body::Body<Data = alloy::primitives::bytes::Bytes> + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    #[inline]
    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: HttpRequest<B>) -> Self::Future {
        if req.uri().path() == METRICS_PATH {
            let handle = self.recorder.clone();

            return async move {
                HttpResponse::builder()
                    .header(http::header::CONTENT_TYPE, "text/plain; version=0.0.4")
                    .body(handle.render().into())
                    .map_err(BoxError::from)
            }
            .boxed();
        }

        let req = req.map(HttpBody::new);
        self.inner.call(req).map_err(Into::into).boxed()
    }
}

/// Metrics of a `fees_` method.
#[derive(Metrics, Clone)]
#[metrics(scope = "rpc.call")]
struct RpcMethodMetrics {
    /// The number of calls to the method.
    count: Counter,
    /// Time spent answering the call.
    duration: Histogram,
}

/// A [`jsonrpsee`] RPC middleware that records call counts and latencies per method.
#[derive(Clone)]
pub struct RpcMetricsService<S> {
    service: S,
}

impl<S> RpcMetricsService<S> {
    /// Create a new RPC middleware that records metrics for RPC methods.
    pub fn new(inner: S) -> Self {
        Self { service: inner }
    }
}

impl<'a, S> RpcServiceT<'a> for RpcMetricsService<S>
where
    S: RpcServiceT<'a> + Send + Sync + Clone + 'static,
{
    type Future = BoxFuture<'a, MethodResponse>;

    fn call(&self, req: Request<'a>) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let method = req.method_name().to_string();
            let started = Instant::now();
            let rp = service.call(req).await;

            let metrics = RpcMethodMetrics::new_with_labels(&[
                ("method", method),
                ("code", rp.as_error_code().unwrap_or_default().to_string()),
            ]);
            metrics.count.increment(1);
            metrics.duration.record(started.elapsed());

            rp
        })
    }
}
