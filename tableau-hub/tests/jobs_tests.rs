//! Integration tests for background jobs

mod helpers;

use helpers::{portrait_only, rotation, MockSource, START_MS};
use std::sync::Arc;
use std::time::Duration;
use tableau_common::ManualClock;
use tableau_hub::content::{ContentFilters, Orientation, SourceKey};
use tableau_hub::jobs;

#[tokio::test]
async fn test_pool_refresher_survives_zero_period() {
    let clock = ManualClock::new(START_MS);
    let source = Arc::new(MockSource::new(SourceKey::Met, Orientation::Portrait, 24));
    let manager = rotation(&clock, vec![source], portrait_only());

    let handle = jobs::spawn_pool_refresher(manager.clone(), Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!handle.is_finished());
    // First tick warms the pool
    assert!(manager.cached_pool("portrait", &ContentFilters::default()).is_some());

    handle.abort();
    let result = handle.await;
    assert!(result.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_cache_sweeper_survives_zero_period() {
    let clock = ManualClock::new(START_MS);
    let source = Arc::new(MockSource::new(SourceKey::Met, Orientation::Portrait, 4));
    let manager = rotation(&clock, vec![source], portrait_only());

    let handle = jobs::spawn_cache_sweeper(&manager, Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!handle.is_finished());
    handle.abort();
}
