//! Price metrics

use metrics::{Counter, Gauge};
use metrics_derive::Metrics;

/// Metrics for quotes of one symbol in one currency.
#[derive(Metrics)]
#[metrics(scope = "price")]
pub struct QuoteMetrics {
    /// Number of provider requests.
    pub requests: Counter,
    /// Number of failed provider requests.
    pub errors: Counter,
    /// Last fetched rate.
    pub rate: Gauge,
}
