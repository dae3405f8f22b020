//! Cache metrics

use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// Metrics of one named cache.
#[derive(Metrics, Clone)]
#[metrics(scope = "cache")]
pub struct CacheMetrics {
    /// Lookups answered from a fresh entry.
    pub hits: Counter,
    /// Lookups that started a refresh.
    pub misses: Counter,
    /// Lookups that attached to a refresh already in flight.
    pub joined: Counter,
    /// Lookups answered with an expired value because the refresh failed.
    pub stale: Counter,
    /// Refresh duration in seconds.
    pub refresh_duration: Histogram,
}
