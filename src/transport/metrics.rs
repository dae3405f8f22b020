//! Upstream call metrics

use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// Metrics for calls of one method on one chain.
#[derive(Metrics)]
#[metrics(scope = "upstream")]
pub struct UpstreamCallMetrics {
    /// Number of calls made.
    pub calls: Counter,
    /// Number of calls that failed.
    pub errors: Counter,
    /// Call latency in seconds.
    pub latency: Histogram,
}
