//! Rotation pool manager
//!
//! Maps wall-clock time to a deterministic item per category. Time is divided
//! into slots of `interval_seconds`; within one slot every caller sees the
//! same item, and the pool index advances by one per slot.
//!
//! Cache layout (one shared [`TtlCache`]):
//! - `pool:{category}:{signature}` holds the built pool, TTL `pool_ttl_seconds`
//! - `rotation:{category}:{signature}:{slot}` holds the slot's pick, TTL one interval
//!
//! Fallback chain when the pick cannot be produced: first item of a cached
//! (possibly expired, not yet swept) pool, then the configured sentinel.

use crate::content::fetcher::ContentFetcher;
use crate::content::types::{ContentError, ContentFilters, ContentItem, ContentPool, Orientation};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tableau_common::cache::CacheStats;
use tableau_common::events::{EventBus, TableauEvent};
use tableau_common::{Clock, TtlCache};
use tracing::{debug, info, warn};

/// A configured rotation domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationCategory {
    pub name: String,
    #[serde(default)]
    pub orientation: Orientation,
    /// Seconds each item stays on screen
    pub interval_seconds: u64,
    /// Target number of distinct items per pool
    pub pool_size: usize,
}

impl RotationCategory {
    pub fn new(
        name: impl Into<String>,
        orientation: Orientation,
        interval_seconds: u64,
        pool_size: usize,
    ) -> Self {
        Self {
            name: name.into(),
            orientation,
            interval_seconds,
            pool_size,
        }
    }

    /// `portrait` and `landscape`, five minutes per item, twelve items each
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("portrait", Orientation::Portrait, 300, 12),
            Self::new("landscape", Orientation::Landscape, 300, 12),
        ]
    }
}

/// Value stored in the rotation cache
#[derive(Debug, Clone)]
pub enum RotationEntry {
    Pool(Arc<ContentPool>),
    Pick(ContentItem),
}

/// Slot index for `now_ms`
pub fn rotation_slot(now_ms: i64, interval_seconds: u64) -> i64 {
    let interval_ms = (interval_seconds.max(1) as i64).saturating_mul(1000);
    now_ms.div_euclid(interval_ms)
}

fn pool_key(category: &str, signature: &str) -> String {
    format!("pool:{}:{}", category, signature)
}

fn rotation_key(category: &str, signature: &str, slot: i64) -> String {
    format!("rotation:{}:{}:{}", category, signature, slot)
}

/// Builds, caches and cycles through content pools
pub struct RotationManager {
    fetcher: Arc<ContentFetcher>,
    cache: Arc<TtlCache<RotationEntry>>,
    clock: Arc<dyn Clock>,
    categories: Vec<RotationCategory>,
    pool_ttl_seconds: i64,
    unavailable: ContentItem,
    events: Option<EventBus>,
}

impl RotationManager {
    pub fn new(
        fetcher: Arc<ContentFetcher>,
        cache: Arc<TtlCache<RotationEntry>>,
        clock: Arc<dyn Clock>,
        categories: Vec<RotationCategory>,
        pool_ttl_seconds: i64,
        unavailable: ContentItem,
    ) -> Self {
        Self {
            fetcher,
            cache,
            clock,
            categories,
            pool_ttl_seconds,
            unavailable,
            events: None,
        }
    }

    /// Announce out-of-band pool rebuilds on `bus`
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn categories(&self) -> &[RotationCategory] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&RotationCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn cache(&self) -> &Arc<TtlCache<RotationEntry>> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn unavailable_item(&self) -> &ContentItem {
        &self.unavailable
    }

    /// Currently cached pool for a category, if live
    pub fn cached_pool(&self, category: &str, filters: &ContentFilters) -> Option<Arc<ContentPool>> {
        match self.cache.get(&pool_key(category, &filters.signature())) {
            Some(RotationEntry::Pool(pool)) => Some(pool),
            _ => None,
        }
    }

    /// Item on display for `category` right now
    ///
    /// Never fails: falls back to a stale pool's first item, then to the
    /// sentinel item.
    pub async fn get_current(&self, category: &str, filters: &ContentFilters) -> ContentItem {
        let Some(cat) = self.category(category) else {
            warn!(category, "Unknown rotation category, serving placeholder");
            return self.unavailable.clone();
        };

        match self.current_pick(cat, filters).await {
            Ok(item) => item,
            Err(err) => {
                warn!(category, error = %err, "Rotation pick failed, using fallback");
                self.fallback(cat, filters)
            }
        }
    }

    /// Current item for every configured category, fetched concurrently
    pub async fn get_all(&self, filters: &ContentFilters) -> BTreeMap<String, ContentItem> {
        let picks = join_all(self.categories.iter().map(move |cat| async move {
            (cat.name.clone(), self.get_current(&cat.name, filters).await)
        }))
        .await;
        picks.into_iter().collect()
    }

    /// Rebuild and re-cache the pool for `category`
    ///
    /// Slot picks already cached keep serving until their slot ends.
    pub async fn refresh_pool(
        &self,
        category: &str,
        filters: &ContentFilters,
    ) -> Result<usize, ContentError> {
        let cat = self
            .category(category)
            .ok_or_else(|| ContentError::UnknownCategory(category.to_string()))?;
        let signature = filters.signature();

        let pool = self.build_and_store(cat, filters, &signature).await?;
        let items = pool.len();

        if let Some(bus) = &self.events {
            bus.emit_lossy(TableauEvent::PoolRefreshed {
                category: cat.name.clone(),
                filter_signature: signature,
                items,
                timestamp: self.clock.now(),
            });
        }
        Ok(items)
    }

    /// Refresh every category with default filters; returns the number rebuilt
    pub async fn refresh_all(&self) -> usize {
        let filters = ContentFilters::default();
        let mut refreshed = 0;
        for cat in &self.categories {
            match self.refresh_pool(&cat.name, &filters).await {
                Ok(items) => {
                    debug!(category = %cat.name, items, "Pool refreshed");
                    refreshed += 1;
                }
                Err(err) => {
                    warn!(category = %cat.name, error = %err, "Pool refresh failed");
                }
            }
        }
        info!(refreshed, total = self.categories.len(), "Pool refresh pass complete");
        refreshed
    }

    async fn current_pick(
        &self,
        cat: &RotationCategory,
        filters: &ContentFilters,
    ) -> Result<ContentItem, ContentError> {
        let slot = rotation_slot(self.clock.now_ms(), cat.interval_seconds);
        let signature = filters.signature();
        let key = rotation_key(&cat.name, &signature, slot);

        let sig = signature.as_str();
        let entry = self
            .cache
            .get_or_set(
                &key,
                move || async move {
                    let pool = self.pool_for(cat, filters, sig).await?;
                    Ok::<_, ContentError>(RotationEntry::Pick(pool.item_for_slot(slot).clone()))
                },
                Some(cat.interval_seconds as i64),
            )
            .await?;

        Ok(match entry {
            RotationEntry::Pick(item) => item,
            RotationEntry::Pool(pool) => pool.item_for_slot(slot).clone(),
        })
    }

    async fn pool_for(
        &self,
        cat: &RotationCategory,
        filters: &ContentFilters,
        signature: &str,
    ) -> Result<Arc<ContentPool>, ContentError> {
        if let Some(RotationEntry::Pool(pool)) = self.cache.get(&pool_key(&cat.name, signature)) {
            return Ok(pool);
        }
        self.build_and_store(cat, filters, signature).await
    }

    async fn build_and_store(
        &self,
        cat: &RotationCategory,
        filters: &ContentFilters,
        signature: &str,
    ) -> Result<Arc<ContentPool>, ContentError> {
        let pool = Arc::new(
            self.fetcher
                .build_pool(&cat.name, cat.orientation, cat.pool_size, filters)
                .await?,
        );
        self.cache.set(
            pool_key(&cat.name, signature),
            RotationEntry::Pool(pool.clone()),
            Some(self.pool_ttl_seconds),
        );
        Ok(pool)
    }

    fn fallback(&self, cat: &RotationCategory, filters: &ContentFilters) -> ContentItem {
        match self.cache.peek_stale(&pool_key(&cat.name, &filters.signature())) {
            Some(RotationEntry::Pool(pool)) => pool.first().clone(),
            _ => self.unavailable.clone(),
        }
    }
}
