//! Fiat quote caching.
//!
//! Quotes change slowly compared to gas prices, so they are kept for their own, longer TTL.
//! Concurrent lookups of the same quote are coalesced into a single provider request.

use super::CacheMetrics;
use crate::constants::MAX_CACHED_QUOTES;
use moka::future::Cache;
use rust_decimal::Decimal;
use std::{fmt, future::Future, sync::Arc, time::Duration};

/// Key of a cached quote.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct QuoteKey {
    /// Uppercased asset symbol, e.g. `ETH`.
    pub symbol: String,
    /// Uppercased fiat currency, e.g. `USD`.
    pub currency: String,
}

impl QuoteKey {
    /// Creates a key, normalizing both parts to uppercase.
    pub fn new(symbol: &str, currency: &str) -> Self {
        Self { symbol: symbol.to_uppercase(), currency: currency.to_uppercase() }
    }
}

/// Cache of `price of one symbol in one currency`.
#[derive(Clone)]
pub struct QuoteCache {
    cache: Cache<QuoteKey, Decimal>,
    metrics: CacheMetrics,
}

impl fmt::Debug for QuoteCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuoteCache").field("entries", &self.cache.entry_count()).finish()
    }
}

impl QuoteCache {
    /// Creates a cache whose quotes live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(MAX_CACHED_QUOTES).time_to_live(ttl).build(),
            metrics: CacheMetrics::new_with_labels(&[("cache", "quotes")]),
        }
    }

    /// Returns the quote of `key`, fetching it with `fetch` if it is not cached.
    ///
    /// Failed fetches are not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: QuoteKey, fetch: F) -> Result<Decimal, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Decimal, E>>,
        E: Send + Sync + 'static,
    {
        if self.cache.contains_key(&key) {
            self.metrics.hits.increment(1);
        } else {
            self.metrics.misses.increment(1);
        }
        self.cache.try_get_with(key, fetch()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fetches_once_per_key() {
        let cache = QuoteCache::new(Duration::from_secs(300));
        let calls = &AtomicUsize::new(0);
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(Decimal::new(30005, 1))
        };

        let key = QuoteKey::new("eth", "usd");
        assert_eq!(cache.get_or_fetch(key.clone(), fetch).await.unwrap(), Decimal::new(30005, 1));
        assert_eq!(cache.get_or_fetch(key, fetch).await.unwrap(), Decimal::new(30005, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.get_or_fetch(QuoteKey::new("ETH", "EUR"), fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = QuoteCache::new(Duration::from_secs(300));
        let key = QuoteKey::new("POL", "USD");

        let err = cache
            .get_or_fetch(key.clone(), || async { Err::<Decimal, _>("rate limited") })
            .await
            .unwrap_err();
        assert_eq!(*err, "rate limited");

        let quote =
            cache.get_or_fetch(key, || async { Ok::<_, &str>(Decimal::new(25, 2)) }).await.unwrap();
        assert_eq!(quote, Decimal::new(25, 2));
    }
}
