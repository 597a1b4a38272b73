//! Fail-open facade over a [`ResultStore`].
//!
//! Every backend call is bounded by the configured timeout. Errors and
//! timeouts are logged and counted, then reported to the caller as a miss
//! (reads) or silently dropped (writes); they never fail a render.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, warn};
use wpp_widget_types::PopularPost;

use super::config::CacheConfig;
use super::flight::{Flight, SingleFlight};
use super::keys::Fingerprint;
use super::store::{MemoryResultStore, ResultStore, StoreError};

const SOURCE: &str = "cache::result_cache";

pub const METRIC_CACHE_HIT: &str = "wpp_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "wpp_cache_miss_total";
pub const METRIC_CACHE_BYPASS: &str = "wpp_cache_bypass_total";
pub const METRIC_CACHE_ERROR: &str = "wpp_cache_error_total";

/// Where a result set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a live cache entry.
    Hit,
    /// Computed by the query executor and (when possible) stored.
    Miss,
    /// Caching is disabled; computed without touching the store.
    Bypass,
}

impl CacheStatus {
    pub fn is_cached(self) -> bool {
        matches!(self, Self::Hit)
    }
}

#[derive(Clone)]
pub struct ResultCache {
    config: CacheConfig,
    store: Arc<dyn ResultStore>,
    flights: SingleFlight,
}

impl ResultCache {
    pub fn new(config: CacheConfig, store: Arc<dyn ResultStore>) -> Self {
        Self {
            config,
            store,
            flights: SingleFlight::new(),
        }
    }

    /// Cache backed by a [`MemoryResultStore`] sized from `config`.
    pub fn in_memory(config: CacheConfig) -> Self {
        let store = Arc::new(MemoryResultStore::new(&config));
        Self::new(config, store)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.config.active
    }

    /// Look up a result set; any backend failure reads as a miss.
    pub async fn get(&self, key: &Fingerprint) -> Option<Vec<PopularPost>> {
        let bytes = self.fetch(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(posts) => Some(posts),
            Err(err) => {
                warn!(
                    op = "decode",
                    target_module = SOURCE,
                    fingerprint = key.short(),
                    error = %err,
                    result = "evicted",
                    "Discarding undecodable cache entry"
                );
                self.invalidate(key).await;
                None
            }
        }
    }

    /// Store a result set for the configured TTL; failures are logged only.
    pub async fn set(&self, key: &Fingerprint, posts: &[PopularPost]) {
        let value = match serde_json::to_vec(posts) {
            Ok(value) => Bytes::from(value),
            Err(err) => {
                warn!(
                    op = "encode",
                    target_module = SOURCE,
                    fingerprint = key.short(),
                    error = %err,
                    "Skipping cache write for unencodable result set"
                );
                return;
            }
        };

        let ttl = self.config.ttl();
        let outcome =
            tokio::time::timeout(self.config.backend_timeout(), self.store.set(key, value, ttl))
                .await;
        match outcome {
            Ok(Ok(())) => debug!(fingerprint = key.short(), ttl_secs = ttl.as_secs(), "Stored result set"),
            Ok(Err(err)) => self.record_failure("set", key, &err),
            Err(_) => self.record_failure("set", key, &self.timeout_error()),
        }
    }

    pub async fn invalidate(&self, key: &Fingerprint) {
        let outcome =
            tokio::time::timeout(self.config.backend_timeout(), self.store.invalidate(key)).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.record_failure("invalidate", key, &err),
            Err(_) => self.record_failure("invalidate", key, &self.timeout_error()),
        }
    }

    pub async fn clear(&self) {
        let outcome = tokio::time::timeout(self.config.backend_timeout(), self.store.clear()).await;
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(_) => self.timeout_error(),
        };
        counter!(METRIC_CACHE_ERROR, "op" => "clear").increment(1);
        warn!(
            op = "clear",
            target_module = SOURCE,
            error = %error,
            result = "ignored",
            "Result cache clear failed"
        );
    }

    /// Serve `key` from the cache or compute it with `compute`.
    ///
    /// With single-flight enabled, concurrent misses on one fingerprint run
    /// `compute` once and the others receive that result directly, so a
    /// failing backend does not turn them into a queue. If the leading
    /// computation fails, each follower computes on its own. A failed
    /// computation is returned to the caller and never stored.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &Fingerprint,
        compute: F,
    ) -> Result<(Vec<PopularPost>, CacheStatus), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<PopularPost>, E>>,
    {
        if let Some(posts) = self.get(key).await {
            counter!(METRIC_CACHE_HIT).increment(1);
            return Ok((posts, CacheStatus::Hit));
        }

        if !self.config.single_flight {
            return self.compute_and_store(key, compute).await;
        }

        match self.flights.join(key) {
            Flight::Follower(waiter) => match waiter.recv().await {
                Some(posts) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    debug!(fingerprint = key.short(), "Served result computed by a concurrent render");
                    Ok((posts, CacheStatus::Hit))
                }
                None => self.compute_and_store(key, compute).await,
            },
            Flight::Leader(lease) => {
                if let Some(posts) = self.get(key).await {
                    lease.publish(&posts);
                    counter!(METRIC_CACHE_HIT).increment(1);
                    return Ok((posts, CacheStatus::Hit));
                }

                counter!(METRIC_CACHE_MISS).increment(1);
                let posts = compute().await?;
                lease.publish(&posts);
                self.set(key, &posts).await;
                Ok((posts, CacheStatus::Miss))
            }
        }
    }

    async fn compute_and_store<F, Fut, E>(
        &self,
        key: &Fingerprint,
        compute: F,
    ) -> Result<(Vec<PopularPost>, CacheStatus), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<PopularPost>, E>>,
    {
        counter!(METRIC_CACHE_MISS).increment(1);
        let posts = compute().await?;
        self.set(key, &posts).await;
        Ok((posts, CacheStatus::Miss))
    }

    async fn fetch(&self, key: &Fingerprint) -> Option<Bytes> {
        match tokio::time::timeout(self.config.backend_timeout(), self.store.get(key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                self.record_failure("get", key, &err);
                None
            }
            Err(_) => {
                self.record_failure("get", key, &self.timeout_error());
                None
            }
        }
    }

    fn timeout_error(&self) -> StoreError {
        StoreError::Timeout(self.config.backend_timeout())
    }

    fn record_failure(&self, op: &'static str, key: &Fingerprint, error: &StoreError) {
        counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
        warn!(
            op,
            target_module = SOURCE,
            fingerprint = key.short(),
            error = %error,
            result = "fail_open",
            "Result cache backend call failed"
        );
    }
}
