//! Caches for upstream data.
//!
//! [`FeeCache`] keeps one value per key for a fixed TTL. A key has at most one refresh in flight;
//! lookups that arrive while it runs attach to it instead of starting their own. Refreshes run on
//! their own task and write their result back themselves, so a caller that goes away never
//! cancels one.
//!
//! When a refresh fails and the key has an expired value, that value is served as stale. Errors
//! are never cached: the next lookup retries.

use dashmap::DashMap;
use futures_util::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use std::{
    fmt::{self, Display},
    future::Future,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

mod metrics;
pub use metrics::CacheMetrics;

mod price;
pub use price::{QuoteCache, QuoteKey};

/// Result of a [`FeeCache`] lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<V> {
    /// The cached value.
    pub value: V,
    /// When the value was fetched, in seconds since the epoch.
    pub fetched_at: u64,
    /// Whether the value expired and could not be refreshed.
    pub stale: bool,
    /// Why the value is stale.
    pub note: Option<String>,
}

type Refresh<V> = Shared<BoxFuture<'static, Result<Lookup<V>, String>>>;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    fetched_at: u64,
    expires_at: Instant,
}

struct Slot<V> {
    entry: Option<Entry<V>>,
    refresh: Option<Refresh<V>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self { entry: None, refresh: None }
    }
}

/// TTL cache with per-key refresh deduplication.
#[derive(Clone)]
pub struct FeeCache<V> {
    name: &'static str,
    ttl: Duration,
    slots: Arc<DashMap<String, Slot<V>>>,
    metrics: CacheMetrics,
}

impl<V> fmt::Debug for FeeCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeeCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("keys", &self.slots.len())
            .finish()
    }
}

impl<V> FeeCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache whose values live for `ttl`.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slots: Default::default(),
            metrics: CacheMetrics::new_with_labels(&[("cache", name)]),
        }
    }

    /// Lifetime of a cached value.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the value of `key`, refreshing it with `refresh` if it is missing or expired.
    ///
    /// `refresh` is only called when this lookup starts the refresh. The error is the display
    /// string of the refresh error, shared by every caller that waited on it.
    pub async fn get_or_refresh<F, Fut, E>(&self, key: &str, refresh: F) -> Result<Lookup<V>, String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let pending = {
            let mut slot = self.slots.entry(key.to_string()).or_default();

            if let Some(entry) = &slot.entry
                && entry.expires_at > Instant::now()
            {
                trace!(cache = self.name, key, "Cache hit");
                self.metrics.hits.increment(1);
                return Ok(Lookup {
                    value: entry.value.clone(),
                    fetched_at: entry.fetched_at,
                    stale: false,
                    note: None,
                });
            }

            match slot.refresh.as_ref().filter(|pending| pending.peek().is_none()) {
                Some(pending) => {
                    self.metrics.joined.increment(1);
                    pending.clone()
                }
                None => {
                    self.metrics.misses.increment(1);
                    let pending = self.spawn_refresh(key.to_string(), refresh());
                    slot.refresh = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Spawns a refresh of `key` that stores its own result.
    fn spawn_refresh<Fut, E>(&self, key: String, refresh: Fut) -> Refresh<V>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let name = self.name;
        let ttl = self.ttl;
        let slots = self.slots.clone();
        let metrics = self.metrics.clone();

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let result = refresh.await;
            metrics.refresh_duration.record(started.elapsed().as_secs_f64());

            let mut slot = slots.entry(key.clone()).or_default();
            slot.refresh = None;

            match result {
                Ok(value) => {
                    let previous = slot.entry.as_ref().map(|entry| entry.fetched_at);
                    let fetched_at = next_fetched_at(previous, unix_now());
                    slot.entry = Some(Entry {
                        value: value.clone(),
                        fetched_at,
                        expires_at: Instant::now() + ttl,
                    });
                    debug!(cache = name, %key, fetched_at, "Cache refreshed");
                    Ok(Lookup { value, fetched_at, stale: false, note: None })
                }
                Err(err) => match &slot.entry {
                    Some(entry) => {
                        warn!(cache = name, %key, %err, "Refresh failed, serving stale value");
                        metrics.stale.increment(1);
                        Ok(Lookup {
                            value: entry.value.clone(),
                            fetched_at: entry.fetched_at,
                            stale: true,
                            note: Some(format!("refresh failed: {err}")),
                        })
                    }
                    None => {
                        debug!(cache = name, %key, %err, "Refresh failed");
                        Err(err.to_string())
                    }
                },
            }
        });

        task.map(|joined| joined.unwrap_or_else(|err| Err(format!("refresh task failed: {err}"))))
            .boxed()
            .shared()
    }
}

/// `fetched_at` of a new value: now, but never before the value it replaces.
fn next_fetched_at(previous: Option<u64>, now: u64) -> u64 {
    previous.map_or(now, |previous| previous.max(now))
}

/// Seconds since the epoch.
pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_secs()).unwrap_or_default()
}
