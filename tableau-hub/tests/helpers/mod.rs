//! Shared fixtures for tableau-hub integration tests
//!
//! Everything runs against in-memory sources and feeds driven by a
//! `ManualClock`, so no test touches the network or sleeps.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tableau_common::events::EventBus;
use tableau_common::{Clock, ManualClock, TtlCache};
use tableau_hub::aggregator::{Aggregator, AggregatorSettings, Feeds, ModeRegistry, ModeState};
use tableau_hub::content::{
    CandidateQuery, ContentFetcher, ContentItem, ContentSource, FetchSettings, Orientation,
    RawItem, RotationCategory, RotationManager, SharedSource, SourceError, SourceKey,
    SourceWeight,
};
use tableau_hub::feeds::{
    CalendarEvent, DailyForecast, Feed, FeedError, TaskItem, TransitArrival, WeatherReport,
};
use tableau_hub::AppState;

/// Start of a 300 s slot: 1_800_000_000_000 / 300_000 = 6_000_000
pub const START_MS: i64 = 1_800_000_000_000;

pub const POOL_TTL_SECONDS: i64 = 3600;

// =============================================================================
// Content sources
// =============================================================================

/// In-memory adapter serving one fresh item per successful call
///
/// Items cycle through `count` distinct ids. Odd-numbered calls fail when
/// built with [`MockSource::flaky`]; every call fails during an outage.
pub struct MockSource {
    key: SourceKey,
    orientation: Orientation,
    count: usize,
    fail_odd_calls: bool,
    outage: AtomicBool,
    calls: AtomicUsize,
    served: AtomicUsize,
}

impl MockSource {
    pub fn new(key: SourceKey, orientation: Orientation, count: usize) -> Self {
        Self {
            key,
            orientation,
            count: count.max(1),
            fail_odd_calls: false,
            outage: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            served: AtomicUsize::new(0),
        }
    }

    pub fn flaky(key: SourceKey, orientation: Orientation, count: usize) -> Self {
        Self {
            fail_odd_calls: true,
            ..Self::new(key, orientation, count)
        }
    }

    pub fn down(key: SourceKey) -> Self {
        let source = Self::new(key, Orientation::Portrait, 1);
        source.set_outage(true);
        source
    }

    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for MockSource {
    fn key(&self) -> SourceKey {
        self.key
    }

    async fn search_candidates(&self, _query: &CandidateQuery) -> Result<Vec<RawItem>, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.outage.load(Ordering::SeqCst) || (self.fail_odd_calls && call % 2 == 1) {
            return Err(SourceError::Network(format!("simulated outage on call {}", call)));
        }

        let n = self.served.fetch_add(1, Ordering::SeqCst) % self.count;
        Ok(vec![RawItem(json!({
            "id": format!("{}-{}", self.key, n),
            "orientation": self.orientation,
        }))])
    }

    fn normalize(&self, raw: RawItem) -> Option<ContentItem> {
        let id = raw.0.get("id")?.as_str()?.to_string();
        let orientation: Orientation = serde_json::from_value(raw.0.get("orientation")?.clone()).ok()?;
        Some(ContentItem {
            title: format!("Artwork {}", id),
            image_url: format!("https://images.test/{}.jpg", id),
            id,
            source: self.key,
            orientation,
            artist: None,
            date: None,
            thumbnail_url: None,
            detail_url: None,
            width: None,
            height: None,
        })
    }
}

pub fn fetch_settings() -> FetchSettings {
    FetchSettings {
        retry_delay: Duration::ZERO,
        ..FetchSettings::default()
    }
}

pub fn portrait_only() -> Vec<RotationCategory> {
    vec![RotationCategory::new("portrait", Orientation::Portrait, 300, 12)]
}

/// Rotation manager over `sources`, each weighted 1
pub fn rotation(
    clock: &ManualClock,
    sources: Vec<Arc<MockSource>>,
    categories: Vec<RotationCategory>,
) -> Arc<RotationManager> {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let weights: Vec<SourceWeight> = sources
        .iter()
        .map(|s| SourceWeight {
            key: s.key(),
            weight: 1,
            enabled: true,
        })
        .collect();
    let shared: Vec<SharedSource> = sources.into_iter().map(|s| s as SharedSource).collect();

    let fetcher = Arc::new(ContentFetcher::with_rng(
        shared,
        &weights,
        fetch_settings(),
        clock.clone(),
        StdRng::seed_from_u64(7),
    ));
    let cache = Arc::new(TtlCache::with_clock(300, clock.clone()));

    Arc::new(RotationManager::new(
        fetcher,
        cache,
        clock,
        categories,
        POOL_TTL_SECONDS,
        ContentItem::unavailable("Artwork unavailable", "/static/unavailable.png"),
    ))
}

// =============================================================================
// Feeds
// =============================================================================

/// Feed answering every call with the same canned outcome
pub struct StubFeed<T> {
    name: &'static str,
    outcome: Result<T, FeedError>,
    calls: AtomicUsize,
}

impl<T> StubFeed<T> {
    pub fn ok(name: &'static str, value: T) -> Self {
        Self {
            name,
            outcome: Ok(value),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str, error: FeedError) -> Self {
        Self {
            name,
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Feed<T> for StubFeed<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self) -> Result<T, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

pub fn now(clock: &ManualClock) -> DateTime<Utc> {
    clock.now()
}

pub fn sample_weather() -> WeatherReport {
    WeatherReport {
        temperature: 18.5,
        feels_like: Some(17.0),
        humidity: Some(62.0),
        wind_speed: Some(11.0),
        code: 2,
        description: "Partly cloudy".to_string(),
        temperature_unit: "°C".to_string(),
        observed_at: Some("2027-01-15T08:00".to_string()),
        forecast: vec![DailyForecast {
            date: "2027-01-15".to_string(),
            high: Some(21.0),
            low: Some(12.0),
            code: Some(3),
            description: Some("Overcast".to_string()),
            precipitation_chance: Some(20.0),
        }],
    }
}

pub fn sample_arrivals(now: DateTime<Utc>) -> Vec<TransitArrival> {
    [4, 12, 25]
        .into_iter()
        .map(|minutes| TransitArrival {
            route: "Red".to_string(),
            destination: Some("Alewife".to_string()),
            arrival: now + ChronoDuration::minutes(minutes),
            status: None,
            minutes_away: None,
        })
        .collect()
}

pub fn sample_events(now: DateTime<Utc>) -> Vec<CalendarEvent> {
    vec![
        CalendarEvent {
            id: "standup".to_string(),
            title: "Standup".to_string(),
            location: None,
            start: now + ChronoDuration::hours(1),
            end: now + ChronoDuration::minutes(75),
            all_day: false,
        },
        CalendarEvent {
            id: "review".to_string(),
            title: "Design review".to_string(),
            location: Some("Room 4".to_string()),
            start: now + ChronoDuration::hours(5),
            end: now + ChronoDuration::hours(6),
            all_day: false,
        },
    ]
}

pub fn task(id: &str, due: Option<DateTime<Utc>>, completed: bool) -> TaskItem {
    TaskItem {
        id: id.to_string(),
        title: format!("Task {}", id),
        due,
        completed,
        priority: 1,
    }
}

/// Overdue, due soon, due later, undated and completed tasks
pub fn sample_tasks(now: DateTime<Utc>) -> Vec<TaskItem> {
    vec![
        task("later", Some(now + ChronoDuration::hours(25)), false),
        task("soon", Some(now + ChronoDuration::hours(23)), false),
        task("undated", None, false),
        task("done", Some(now + ChronoDuration::hours(2)), true),
        task("overdue", Some(now - ChronoDuration::hours(1)), false),
    ]
}

/// Every feed succeeding with the sample data
pub fn healthy_feeds(now: DateTime<Utc>) -> Feeds {
    Feeds {
        weather: Arc::new(StubFeed::ok("weather", sample_weather())),
        transit: Arc::new(StubFeed::ok("transit", sample_arrivals(now))),
        calendar: Arc::new(StubFeed::ok("calendar", sample_events(now))),
        tasks: Arc::new(StubFeed::ok("tasks", sample_tasks(now))),
    }
}

// =============================================================================
// Assembled hub
// =============================================================================

/// Application state wired from in-memory parts
pub struct TestHub {
    pub clock: ManualClock,
    pub state: AppState,
    pub source: Arc<MockSource>,
}

impl TestHub {
    /// Default modes, one healthy portrait source and healthy feeds
    pub fn new() -> Self {
        let clock = ManualClock::new(START_MS);
        let feeds = healthy_feeds(clock.now());
        Self::with_feeds(clock, feeds)
    }

    pub fn with_feeds(clock: ManualClock, feeds: Feeds) -> Self {
        let source = Arc::new(MockSource::new(SourceKey::Met, Orientation::Portrait, 24));
        let rotation = rotation(&clock, vec![source.clone()], portrait_only());
        let state = app_state(&clock, rotation, feeds);
        Self { clock, state, source }
    }
}

pub fn app_state(clock: &ManualClock, rotation: Arc<RotationManager>, feeds: Feeds) -> AppState {
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let bus = EventBus::new(100);
    let modes = Arc::new(
        ModeState::new(Arc::new(ModeRegistry::default()), shared_clock.clone())
            .with_events(bus.clone()),
    );
    let aggregator = Arc::new(Aggregator::new(
        modes,
        feeds,
        rotation,
        shared_clock,
        AggregatorSettings::default(),
    ));
    AppState::new(aggregator, bus)
}
