//! Generic time-to-live cache store
//!
//! Maps string keys to values with an optional per-entry expiry. Reads after
//! an entry's expiry behave as misses whether or not the background sweep has
//! removed it yet; the sweep only reclaims memory.
//!
//! `get_or_set` does not collapse concurrent misses for the same key: two
//! callers that miss at the same time will both run their producer and the
//! last write wins.

use crate::time::{Clock, SystemClock};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default sweep period for [`TtlCache::spawn_sweeper`]
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// Absolute expiry in epoch milliseconds, `None` = never
    expires_at_ms: Option<i64>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at_ms, Some(at) if now_ms >= at)
    }
}

/// Hit/miss counters and live key count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
}

/// Concurrent TTL cache keyed by string
///
/// TTL arguments are in seconds: `None` uses the store default, zero or a
/// negative value stores the entry without expiry.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl_seconds: i64,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache on the system clock
    pub fn new(default_ttl_seconds: i64) -> Self {
        Self::with_clock(default_ttl_seconds, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(default_ttl_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl_seconds,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn expiry_for(&self, ttl_seconds: Option<i64>) -> Option<i64> {
        let ttl = ttl_seconds.unwrap_or(self.default_ttl_seconds);
        if ttl <= 0 {
            None
        } else {
            Some(self.clock.now_ms().saturating_add(ttl.saturating_mul(1000)))
        }
    }

    /// Look up a live value, counting a hit or a miss
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        let found = self
            .read_entries()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Look up a value even if it has expired but not been swept yet
    ///
    /// Does not touch the hit/miss counters.
    pub fn peek_stale(&self, key: &str) -> Option<V> {
        self.read_entries().get(key).map(|entry| entry.value.clone())
    }

    /// Store `value`, replacing any existing entry and its expiry
    pub fn set(&self, key: impl Into<String>, value: V, ttl_seconds: Option<i64>) {
        let entry = CacheEntry {
            value,
            expires_at_ms: self.expiry_for(ttl_seconds),
        };
        self.write_entries().insert(key.into(), entry);
    }

    /// Return the cached value, or run `producer` and cache its result
    ///
    /// The producer runs at most once per call and only on a miss. Its error
    /// is returned unchanged and nothing is cached.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        ttl_seconds: Option<i64>,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = producer().await?;
        self.set(key, value.clone(), ttl_seconds);
        Ok(value)
    }

    /// Like [`get_or_set`](Self::get_or_set), but an absent result is
    /// returned without being cached
    pub async fn get_or_set_optional<F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        ttl_seconds: Option<i64>,
    ) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(Some(value));
        }

        let produced = producer().await?;
        if let Some(value) = &produced {
            self.set(key, value.clone(), ttl_seconds);
        }
        Ok(produced)
    }

    /// Remove an entry; returns whether one was present
    pub fn delete(&self, key: &str) -> bool {
        self.write_entries().remove(key).is_some()
    }

    /// Whether a live (unexpired) entry exists
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.read_entries()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Keys of all live entries
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now_ms();
        self.read_entries()
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Drop every entry and reset the counters
    pub fn flush(&self) {
        self.write_entries().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.keys().len(),
        }
    }

    /// Remove expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.write_entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    /// Spawn a task that purges expired entries every `period`
    ///
    /// The task holds a weak reference and exits once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(removed, "Cache sweep removed expired entries");
                }
            }
        })
    }
}
