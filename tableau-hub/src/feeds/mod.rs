//! Dashboard data feeds
//!
//! Each feed wraps one upstream provider behind the [`Feed`] trait. The hub
//! wraps every feed in a [`CachedFeed`] so repeated aggregations within the
//! provider's TTL never reach the network.

pub mod calendar;
pub mod tasks;
pub mod transit;
pub mod weather;

pub use calendar::{CalendarEvent, CalendarFeed};
pub use tasks::{TaskItem, TasksFeed};
pub use transit::{TransitArrival, TransitFeed};
pub use weather::{DailyForecast, WeatherFeed, WeatherReport};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tableau_common::{CacheStats, Clock, TtlCache};
use thiserror::Error;

/// Feed failure; rendered into the aggregate's `errors` map
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// Required settings (key, coordinates, id) are missing
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedError::Parse(err.to_string())
        } else {
            FeedError::Network(err.to_string())
        }
    }
}

/// Uniform contract for a dashboard data provider
#[async_trait]
pub trait Feed<T>: Send + Sync {
    /// Short provider name for logs and cache keys
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<T, FeedError>;

    /// Hit/miss counters when the feed is cached
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }

    /// Drop any memoized value so the next fetch reaches the provider
    fn invalidate(&self) {}
}

/// Feed decorator that memoizes results for a fixed TTL
///
/// Failures are not cached; the next call retries the provider.
pub struct CachedFeed<T> {
    inner: Arc<dyn Feed<T>>,
    cache: TtlCache<T>,
    ttl_seconds: i64,
}

impl<T: Clone + Send + Sync + 'static> CachedFeed<T> {
    pub fn new(inner: Arc<dyn Feed<T>>, ttl_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            cache: TtlCache::with_clock(ttl_seconds, clock),
            ttl_seconds,
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Feed<T> for CachedFeed<T> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch(&self) -> Result<T, FeedError> {
        let inner = &self.inner;
        self.cache
            .get_or_set(inner.name(), move || inner.fetch(), Some(self.ttl_seconds))
            .await
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats())
    }

    fn invalidate(&self) {
        self.cache.delete(self.inner.name());
    }
}

/// HTTP client with a per-feed timeout
pub(crate) fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, FeedError> {
    reqwest::Client::builder()
        .user_agent(concat!("Tableau/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| FeedError::Network(e.to_string()))
}

/// Map a non-success status to `FeedError::Api`
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FeedError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(FeedError::Api {
        status: status.as_u16(),
        message: message.chars().take(200).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tableau_common::ManualClock;

    struct CountingFeed {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl Feed<u32> for CountingFeed {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self) -> Result<u32, FeedError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                Err(FeedError::Network("down".to_string()))
            } else {
                Ok(n)
            }
        }
    }

    #[tokio::test]
    async fn test_cached_feed_memoizes_within_ttl() {
        let clock = ManualClock::new(0);
        let inner = Arc::new(CountingFeed {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let feed = CachedFeed::new(inner.clone(), 30, Arc::new(clock.clone()));

        assert_eq!(feed.fetch().await.unwrap(), 1);
        clock.advance_secs(29);
        assert_eq!(feed.fetch().await.unwrap(), 1);
        clock.advance_secs(1);
        assert_eq!(feed.fetch().await.unwrap(), 2);

        let stats = feed.cache_stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn test_cached_feed_does_not_cache_failures() {
        let inner = Arc::new(CountingFeed {
            calls: AtomicU32::new(0),
            fail: true,
        });
        let feed = CachedFeed::new(inner.clone(), 30, Arc::new(ManualClock::new(0)));

        assert!(feed.fetch().await.is_err());
        assert!(feed.fetch().await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let inner = Arc::new(CountingFeed {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let feed = CachedFeed::new(inner, 300, Arc::new(ManualClock::new(0)));

        assert_eq!(feed.fetch().await.unwrap(), 1);
        feed.invalidate();
        assert_eq!(feed.fetch().await.unwrap(), 2);
    }
}
