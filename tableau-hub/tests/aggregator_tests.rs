//! Integration tests for mode-filtered aggregation

mod helpers;

use chrono::Duration;
use helpers::{healthy_feeds, sample_arrivals, StubFeed, TestHub, START_MS};
use std::sync::Arc;
use tableau_common::{Clock, ManualClock};
use tableau_hub::aggregator::Feeds;
use tableau_hub::feeds::FeedError;

#[tokio::test]
async fn test_failing_category_is_isolated() {
    let clock = ManualClock::new(START_MS);
    let now = clock.now();
    let feeds = Feeds {
        weather: Arc::new(StubFeed::failing(
            "weather",
            FeedError::Network("connection timed out".to_string()),
        )),
        ..healthy_feeds(now)
    };
    let hub = TestHub::with_feeds(clock, feeds);

    let result = hub.state.aggregator.aggregate(Some("dashboard")).await;

    assert!(result.success);
    assert!(result.weather.is_none());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors["weather"].contains("connection timed out"));

    assert!(result.transit.is_some());
    assert!(result.calendar.is_some());
    assert!(result.tasks.is_some());
    assert!(result.art.is_some());
}

#[tokio::test]
async fn test_every_category_failing_still_succeeds() {
    let clock = ManualClock::new(START_MS);
    let feeds = Feeds {
        weather: Arc::new(StubFeed::failing("weather", FeedError::NotConfigured("Weather location"))),
        transit: Arc::new(StubFeed::failing(
            "transit",
            FeedError::Api {
                status: 503,
                message: "unavailable".to_string(),
            },
        )),
        calendar: Arc::new(StubFeed::failing("calendar", FeedError::Parse("bad json".to_string()))),
        tasks: Arc::new(StubFeed::failing("tasks", FeedError::Network("reset".to_string()))),
    };
    let hub = TestHub::with_feeds(clock, feeds);

    let result = hub.state.aggregator.aggregate(None).await;

    assert!(result.success);
    assert_eq!(result.errors.len(), 4);
    assert!(result.errors["weather"].contains("not configured"));
    // Artwork never fails; it degrades to placeholders instead
    assert!(!result.errors.contains_key("art"));
    assert!(result.art.is_some());
}

#[tokio::test]
async fn test_unknown_mode_matches_default() {
    let hub = TestHub::new();

    let unknown = hub.state.aggregator.aggregate(Some("hyperspace")).await;
    let default = hub.state.aggregator.aggregate(None).await;

    assert_eq!(unknown.mode, "dashboard");
    assert_eq!(unknown, default);
}

#[tokio::test]
async fn test_focus_mode_keeps_only_urgent_tasks() {
    let hub = TestHub::new();

    let result = hub.state.aggregator.aggregate(Some("focus")).await;
    let tasks = result.tasks.expect("focus includes tasks");
    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();

    assert_eq!(ids, vec!["overdue", "soon"]);
}

#[tokio::test]
async fn test_dashboard_lists_all_open_tasks() {
    let hub = TestHub::new();

    let result = hub.state.aggregator.aggregate(Some("dashboard")).await;
    let tasks = result.tasks.expect("dashboard includes tasks");
    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();

    assert_eq!(ids, vec!["overdue", "soon", "later", "undated"]);
}

#[tokio::test]
async fn test_excluded_categories_are_absent() {
    let hub = TestHub::new();

    let result = hub.state.aggregator.aggregate(Some("commute")).await;
    assert!(result.weather.is_some());
    assert!(result.transit.is_some());
    assert!(result.calendar.is_none());
    assert!(result.tasks.is_none());
    assert!(result.art.is_none());

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("calendar").is_none());
    assert!(json.get("tasks").is_none());
    assert!(json.get("art").is_none());
    assert_eq!(json["errors"], serde_json::json!({}));
}

#[tokio::test]
async fn test_excluded_feeds_are_not_called() {
    let clock = ManualClock::new(START_MS);
    let now = clock.now();
    let calendar = Arc::new(StubFeed::ok("calendar", helpers::sample_events(now)));
    let feeds = Feeds {
        calendar: calendar.clone(),
        ..healthy_feeds(now)
    };
    let hub = TestHub::with_feeds(clock, feeds);

    hub.state.aggregator.aggregate(Some("gallery")).await;
    assert_eq!(calendar.calls(), 0);

    hub.state.aggregator.aggregate(Some("focus")).await;
    assert_eq!(calendar.calls(), 1);
}

#[tokio::test]
async fn test_transit_gets_minutes_away() {
    let hub = TestHub::new();

    let result = hub.state.aggregator.aggregate(Some("commute")).await;
    let arrivals = result.transit.expect("commute includes transit");

    assert_eq!(arrivals.len(), sample_arrivals(hub.clock.now()).len());
    let minutes: Vec<Option<i64>> = arrivals.iter().map(|a| a.minutes_away).collect();
    assert_eq!(minutes, vec![Some(4), Some(12), Some(25)]);
}

#[tokio::test]
async fn test_calendar_next_event() {
    let hub = TestHub::new();

    let result = hub.state.aggregator.aggregate(Some("dashboard")).await;
    let calendar = result.calendar.expect("dashboard includes calendar");

    assert_eq!(calendar.next.map(|e| e.id), Some("standup".to_string()));
    assert_eq!(calendar.upcoming.len(), 2);
}

#[tokio::test]
async fn test_snapshot_carries_mode_version() {
    let hub = TestHub::new();
    assert_eq!(hub.state.aggregator.aggregate_current().await.version, 0);

    hub.state.modes.set_mode("gallery").await.unwrap();
    hub.clock.advance_ms(Duration::seconds(5).num_milliseconds());

    let result = hub.state.aggregator.aggregate_current().await;
    assert_eq!(result.mode, "gallery");
    assert_eq!(result.version, 1);
    assert_eq!(result.generated_at, hub.clock.now());
}
