//! Result cache storage.
//!
//! [`ResultStore`] is the seam for the backing key/value store (in-process
//! or networked). [`MemoryResultStore`] is the in-process implementation:
//! an LRU map of complete entries with absolute expiry.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use thiserror::Error;
use time::{OffsetDateTime, PrimitiveDateTime};

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::keys::Fingerprint;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache backend timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// One stored result set.
///
/// Entries are only ever built whole and swapped in by a single `push`, so a
/// reader sees either the previous entry or the new one.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: Fingerprint,
    pub value: Bytes,
    pub expires_at: OffsetDateTime,
}

impl CacheEntry {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// Key/value store holding serialized result sets.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Fetch a live value; expired and absent entries both yield `None`.
    async fn get(&self, key: &Fingerprint) -> Result<Option<Bytes>, StoreError>;

    /// Store `value` until `now + ttl`, replacing any previous entry.
    async fn set(&self, key: &Fingerprint, value: Bytes, ttl: Duration) -> Result<(), StoreError>;

    async fn invalidate(&self, key: &Fingerprint) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-process result store with LRU eviction and lazy expiry.
pub struct MemoryResultStore {
    entries: RwLock<LruCache<Fingerprint, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryResultStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            clock,
        }
    }

    /// Synchronous lookup, purging the entry if it has expired.
    pub fn lookup(&self, key: &Fingerprint) -> Option<Bytes> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "lookup");
        if entries.peek(key)?.is_expired(now) {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Synchronous insert; returns the key evicted to make room, if any.
    pub fn insert(&self, key: Fingerprint, value: Bytes, ttl: Duration) -> Option<Fingerprint> {
        let entry = CacheEntry {
            key: key.clone(),
            value,
            expires_at: expiry(self.clock.now(), ttl),
        };
        // `push` also hands back the replaced entry when the key already existed.
        rw_write(&self.entries, SOURCE, "insert")
            .push(key.clone(), entry)
            .and_then(|(previous, _)| (previous != key).then_some(previous))
    }

    pub fn remove(&self, key: &Fingerprint) {
        rw_write(&self.entries, SOURCE, "remove").pop(key);
    }

    pub fn remove_all(&self) {
        rw_write(&self.entries, SOURCE, "remove_all").clear();
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `now + ttl`, saturating at the largest representable instant.
fn expiry(now: OffsetDateTime, ttl: Duration) -> OffsetDateTime {
    time::Duration::try_from(ttl)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .unwrap_or(PrimitiveDateTime::MAX.assume_utc())
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn get(&self, key: &Fingerprint) -> Result<Option<Bytes>, StoreError> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &Fingerprint, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        self.insert(key.clone(), value, ttl);
        Ok(())
    }

    async fn invalidate(&self, key: &Fingerprint) -> Result<(), StoreError> {
        self.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.remove_all();
        Ok(())
    }
}
