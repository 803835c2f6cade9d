//! Weighted multi-source fetcher
//!
//! Picks an upstream source by configured weight, fetches one candidate item,
//! retries on failure and assembles pools of distinct items.
//!
//! # Algorithm
//! 1. Draw uniformly in `[0, total_weight)` and walk enabled sources in
//!    configured order; the first source whose cumulative weight reaches the
//!    draw is selected
//! 2. Ask that source for a batch of candidates and normalize them
//! 3. Prefer candidates matching the requested orientation, falling back to
//!    any orientation when none match
//! 4. On failure or an empty batch, wait the retry delay and redraw, up to the
//!    attempt budget

use crate::content::types::{
    CandidateQuery, ContentError, ContentFilters, ContentItem, ContentPool, Orientation,
    SharedSource, SourceKey,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tableau_common::Clock;
use tracing::{debug, info, warn};

// ============================================================================
// Weight table
// ============================================================================

/// Configured weight of one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceWeight {
    pub key: SourceKey,
    pub weight: u32,
    pub enabled: bool,
}

/// Enabled sources with positive weight, in configured order
#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    entries: Vec<(SourceKey, u32)>,
    total: u32,
}

impl WeightTable {
    pub fn new(weights: &[SourceWeight]) -> Self {
        let entries: Vec<(SourceKey, u32)> = weights
            .iter()
            .filter(|w| w.enabled && w.weight > 0)
            .map(|w| (w.key, w.weight))
            .collect();
        let total = entries.iter().map(|(_, w)| *w).sum();
        Self { entries, total }
    }

    /// Sum of enabled weights
    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Keys participating in selection
    pub fn keys(&self) -> impl Iterator<Item = SourceKey> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    /// Source for a draw in `[0, total)`
    ///
    /// The first source whose cumulative weight is at least `draw` wins, so a
    /// draw landing exactly on a boundary selects the earlier source.
    pub fn select(&self, draw: f64) -> Option<SourceKey> {
        let mut cumulative = 0u32;
        for (key, weight) in &self.entries {
            cumulative += weight;
            if f64::from(cumulative) >= draw {
                return Some(*key);
            }
        }
        self.entries.last().map(|(key, _)| *key)
    }

    /// Weighted random pick
    ///
    /// # Errors
    /// `NoSourcesEnabled` when the table is empty.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SourceKey, ContentError> {
        if self.is_empty() {
            return Err(ContentError::NoSourcesEnabled);
        }
        let draw = rng.gen_range(0.0..f64::from(self.total));
        self.select(draw).ok_or(ContentError::NoSourcesEnabled)
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Outcome of a retry loop that did not succeed
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation reported an error that must not be retried
    Fatal(E),
    /// Every attempt in the budget failed
    Exhausted { attempts: u32, last_error: E },
}

/// Bounded-attempt retry with a fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `operation` until it succeeds, fails fatally, or the budget is spent
    ///
    /// `operation` receives the 1-based attempt number. `is_retryable`
    /// classifies errors; a non-retryable error ends the loop immediately.
    pub async fn run<T, E, F, Fut, R>(
        &self,
        operation_name: &str,
        mut operation: F,
        is_retryable: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !is_retryable(&err) => return Err(RetryError::Fatal(err)),
                Err(err) => {
                    if attempt >= self.max_attempts {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %err,
                            "Retry budget exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last_error: err,
                        });
                    }
                    debug!(
                        operation = operation_name,
                        attempt,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, will retry after delay"
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Tuning knobs for the fetcher, all externally supplied
#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    /// Delay between retries and after each pool addition
    pub retry_delay: Duration,
    /// Adapter calls per `fetch_one`
    pub fetch_attempts: u32,
    /// Pool attempt budget is `target × attempt_multiplier`
    pub attempt_multiplier: u32,
    /// Raw items requested per adapter call
    pub candidate_batch: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(500),
            fetch_attempts: 3,
            attempt_multiplier: 4,
            candidate_batch: 8,
        }
    }
}

/// Draws items from weighted upstream sources
pub struct ContentFetcher {
    sources: HashMap<SourceKey, SharedSource>,
    weights: WeightTable,
    retry: RetryPolicy,
    settings: FetchSettings,
    rng: Mutex<StdRng>,
    clock: Arc<dyn Clock>,
}

impl ContentFetcher {
    /// Create a fetcher over `sources`
    ///
    /// Weights naming a source with no registered adapter are ignored.
    pub fn new(
        sources: Vec<SharedSource>,
        weights: &[SourceWeight],
        settings: FetchSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_rng(sources, weights, settings, clock, StdRng::from_entropy())
    }

    /// Create a fetcher with a caller-supplied random generator
    pub fn with_rng(
        sources: Vec<SharedSource>,
        weights: &[SourceWeight],
        settings: FetchSettings,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        let sources: HashMap<SourceKey, SharedSource> =
            sources.into_iter().map(|s| (s.key(), s)).collect();
        let usable: Vec<SourceWeight> = weights
            .iter()
            .copied()
            .filter(|w| sources.contains_key(&w.key))
            .collect();
        let weights = WeightTable::new(&usable);

        info!(
            sources = ?weights.keys().collect::<Vec<_>>(),
            total_weight = weights.total(),
            "Content fetcher initialized"
        );

        Self {
            sources,
            weights,
            retry: RetryPolicy::new(settings.fetch_attempts, settings.retry_delay),
            settings,
            rng: Mutex::new(rng),
            clock,
        }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    fn pick_source(&self) -> Result<SourceKey, ContentError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.weights.pick(&mut *rng)
    }

    fn pick_index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..len)
    }

    /// Fetch one item, retrying across weighted source draws
    ///
    /// # Errors
    /// - `NoSourcesEnabled` immediately if the weight table is empty
    /// - `SourceUnavailable` once the attempt budget is spent
    pub async fn fetch_one(
        &self,
        orientation: Orientation,
        filters: &ContentFilters,
    ) -> Result<ContentItem, ContentError> {
        if self.weights.is_empty() {
            return Err(ContentError::NoSourcesEnabled);
        }

        let query = CandidateQuery {
            orientation,
            styles: filters.styles.clone(),
            limit: self.settings.candidate_batch,
        };
        let query = &query;

        self.retry
            .run(
                "fetch_one",
                move |_attempt| self.attempt_fetch(query),
                |err| !matches!(err, ContentError::NoSourcesEnabled),
            )
            .await
            .map_err(|err| match err {
                RetryError::Fatal(err) => err,
                RetryError::Exhausted {
                    attempts,
                    last_error,
                } => ContentError::SourceUnavailable {
                    attempts,
                    last_error: last_error.to_string(),
                },
            })
    }

    /// One weighted draw and one adapter call
    async fn attempt_fetch(&self, query: &CandidateQuery) -> Result<ContentItem, ContentError> {
        let key = self.pick_source()?;
        let source = self
            .sources
            .get(&key)
            .ok_or(ContentError::NoSourcesEnabled)?;

        let raw = source
            .search_candidates(query)
            .await
            .map_err(|e| ContentError::SourceFailed {
                key,
                reason: e.to_string(),
            })?;

        let candidates: Vec<ContentItem> =
            raw.into_iter().filter_map(|r| source.normalize(r)).collect();
        if candidates.is_empty() {
            return Err(ContentError::SourceFailed {
                key,
                reason: "no usable candidates".to_string(),
            });
        }

        let matching: Vec<&ContentItem> = candidates
            .iter()
            .filter(|c| c.orientation.satisfies(query.orientation))
            .collect();
        let chosen = if matching.is_empty() {
            debug!(
                source = %key,
                wanted = query.orientation.as_str(),
                "No candidates match orientation, using any"
            );
            &candidates[self.pick_index(candidates.len())]
        } else {
            matching[self.pick_index(matching.len())]
        };

        Ok(chosen.clone())
    }

    /// Assemble a pool of up to `target` distinct items
    ///
    /// Stops at `target` items or after `target × attempt_multiplier`
    /// `fetch_one` calls. A partial pool is a success.
    ///
    /// # Errors
    /// - `NoSourcesEnabled` if the weight table is empty
    /// - `PoolBuildFailed` if no item was collected
    pub async fn build_pool(
        &self,
        category: &str,
        orientation: Orientation,
        target: usize,
        filters: &ContentFilters,
    ) -> Result<ContentPool, ContentError> {
        let target = target.max(1);
        let budget = (target as u32).saturating_mul(self.settings.attempt_multiplier.max(1));
        let mut items: Vec<ContentItem> = Vec::with_capacity(target);
        let mut seen = HashSet::new();
        let mut attempts = 0u32;

        while items.len() < target && attempts < budget {
            attempts += 1;
            match self.fetch_one(orientation, filters).await {
                Ok(item) => {
                    if seen.insert(item.identity()) {
                        items.push(item);
                        // Pace upstream calls even when nothing failed
                        tokio::time::sleep(self.settings.retry_delay).await;
                    } else {
                        debug!(
                            category,
                            source = %item.source,
                            id = %item.id,
                            "Skipping duplicate item"
                        );
                    }
                }
                Err(ContentError::NoSourcesEnabled) => return Err(ContentError::NoSourcesEnabled),
                Err(err) => {
                    warn!(category, attempts, error = %err, "Pool fetch attempt failed");
                }
            }
        }

        let collected = items.len();
        match ContentPool::new(items, self.clock.now()) {
            Some(pool) => {
                if collected < target {
                    info!(category, collected, target, attempts, "Built partial pool");
                } else {
                    info!(category, collected, attempts, "Built pool");
                }
                Ok(pool)
            }
            None => Err(ContentError::PoolBuildFailed {
                category: category.to_string(),
                attempts,
            }),
        }
    }
}
