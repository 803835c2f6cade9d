//! Background jobs
//!
//! - snapshot publisher: aggregates the current mode and broadcasts it
//! - pool refresher: rebuilds every rotation pool outside the request path
//! - cache sweeper: purges expired rotation entries

use crate::aggregator::CompositeResult;
use crate::content::RotationManager;
use crate::AppState;
use std::sync::Arc;
use std::time::Duration;
use tableau_common::events::TableauEvent;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Shortest period any job ticks at; `tokio::time::interval` rejects zero
const MIN_PERIOD: Duration = Duration::from_secs(1);

fn job_period(name: &str, period: Duration) -> Duration {
    if period < MIN_PERIOD {
        warn!(job = name, requested_ms = period.as_millis() as u64, "Job period too short, using 1 s");
        MIN_PERIOD
    } else {
        period
    }
}

/// Aggregate the current mode and broadcast it as `SnapshotPublished`
pub async fn publish_snapshot(state: &AppState) -> CompositeResult {
    let snapshot = state.aggregator.aggregate_current().await;

    match serde_json::to_value(&snapshot) {
        Ok(value) => state.event_bus.emit_lossy(TableauEvent::SnapshotPublished {
            mode: snapshot.mode.clone(),
            snapshot: value,
            timestamp: snapshot.generated_at,
        }),
        Err(e) => warn!(error = %e, "Failed to serialize snapshot"),
    }

    snapshot
}

/// Publish a snapshot every `period` while anyone is listening
pub fn spawn_snapshot_publisher(state: AppState, period: Duration) -> JoinHandle<()> {
    let period = job_period("snapshot_publisher", period);
    info!(period_secs = period.as_secs(), "Starting snapshot publisher");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if state.event_bus.subscriber_count() == 0 {
                debug!("No subscribers, skipping snapshot");
                continue;
            }
            let snapshot = publish_snapshot(&state).await;
            debug!(
                mode = %snapshot.mode,
                errors = snapshot.errors.len(),
                "Snapshot published"
            );
        }
    })
}

/// Rebuild every pool now and then every `period`
pub fn spawn_pool_refresher(rotation: Arc<RotationManager>, period: Duration) -> JoinHandle<()> {
    let period = job_period("pool_refresher", period);
    info!(period_secs = period.as_secs(), "Starting pool refresher");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            rotation.refresh_all().await;
        }
    })
}

/// Periodically purge expired rotation cache entries
pub fn spawn_cache_sweeper(rotation: &RotationManager, period: Duration) -> JoinHandle<()> {
    let period = job_period("cache_sweeper", period);
    info!(period_secs = period.as_secs(), "Starting cache sweeper");
    rotation.cache().spawn_sweeper(period)
}
