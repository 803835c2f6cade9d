//! tableau-hub library - dashboard aggregation hub
//!
//! Fetches artwork from weighted museum sources and data from weather,
//! transit, calendar and task providers, and publishes mode-filtered
//! snapshots over HTTP, WebSocket and SSE.

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tableau_common::events::EventBus;
use tableau_common::{Clock, Error, Result, TtlCache};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod aggregator;
pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod feeds;
pub mod jobs;

use aggregator::{Aggregator, AggregatorSettings, Feeds, ModeState};
use config::HubConfig;
use content::sources::{ArticSource, ClevelandSource, MetSource};
use content::{ContentFetcher, RotationManager, SharedSource};
use feeds::{
    CachedFeed, CalendarEvent, CalendarFeed, Feed, TaskItem, TasksFeed, TransitArrival, TransitFeed,
    WeatherFeed, WeatherReport,
};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub rotation: Arc<RotationManager>,
    pub modes: Arc<ModeState>,
    pub event_bus: EventBus,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create application state around an assembled aggregator
    pub fn new(aggregator: Arc<Aggregator>, event_bus: EventBus) -> Self {
        Self {
            rotation: aggregator.rotation().clone(),
            modes: aggregator.modes().clone(),
            aggregator,
            event_bus,
            startup_time: Utc::now(),
        }
    }

    /// Wire every component from configuration
    pub fn from_config(config: &HubConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let event_bus = EventBus::new(config.jobs.event_bus_capacity);

        let registry = Arc::new(config.modes.registry()?);
        let modes = Arc::new(ModeState::new(registry, clock.clone()).with_events(event_bus.clone()));

        let sources = build_sources(config)?;
        let fetcher = Arc::new(ContentFetcher::new(
            sources,
            &config.sources.weights(),
            config.rotation.fetch_settings(),
            clock.clone(),
        ));
        let rotation_cache = Arc::new(TtlCache::with_clock(
            config.cache.default_ttl_seconds,
            clock.clone(),
        ));
        let rotation = Arc::new(
            RotationManager::new(
                fetcher,
                rotation_cache,
                clock.clone(),
                config.rotation.categories.clone(),
                config.rotation.pool_ttl_seconds,
                config.rotation.unavailable.item(),
            )
            .with_events(event_bus.clone()),
        );

        let feeds = build_feeds(config, &clock)?;
        let aggregator = Arc::new(Aggregator::new(
            modes,
            feeds,
            rotation,
            clock,
            AggregatorSettings::from(&config.aggregator),
        ));

        Ok(Self::new(aggregator, event_bus))
    }
}

fn build_sources(config: &HubConfig) -> Result<Vec<SharedSource>> {
    let setup = |e: content::SourceError| Error::Internal(e.to_string());
    let met: SharedSource = Arc::new(MetSource::new(config.sources.met.clone()).map_err(setup)?);
    let artic: SharedSource =
        Arc::new(ArticSource::new(config.sources.artic.clone()).map_err(setup)?);
    let cleveland: SharedSource =
        Arc::new(ClevelandSource::new(config.sources.cleveland.clone()).map_err(setup)?);
    Ok(vec![met, artic, cleveland])
}

fn build_feeds(config: &HubConfig, clock: &Arc<dyn Clock>) -> Result<Feeds> {
    let setup = |e: feeds::FeedError| Error::Internal(e.to_string());
    let f = &config.feeds;

    let weather: Arc<dyn Feed<WeatherReport>> =
        Arc::new(WeatherFeed::new(f.weather.clone()).map_err(setup)?);
    let transit: Arc<dyn Feed<Vec<TransitArrival>>> =
        Arc::new(TransitFeed::new(f.transit.clone()).map_err(setup)?);
    let calendar: Arc<dyn Feed<Vec<CalendarEvent>>> =
        Arc::new(CalendarFeed::new(f.calendar.clone(), clock.clone()).map_err(setup)?);
    let tasks: Arc<dyn Feed<Vec<TaskItem>>> =
        Arc::new(TasksFeed::new(f.tasks.clone()).map_err(setup)?);

    Ok(Feeds {
        weather: Arc::new(CachedFeed::new(weather, f.weather.ttl_seconds, clock.clone())),
        transit: Arc::new(CachedFeed::new(transit, f.transit.ttl_seconds, clock.clone())),
        calendar: Arc::new(CachedFeed::new(calendar, f.calendar.ttl_seconds, clock.clone())),
        tasks: Arc::new(CachedFeed::new(tasks, f.tasks.ttl_seconds, clock.clone())),
    })
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        // Composite snapshots
        .route("/api/dashboard", get(api::dashboard::get_dashboard))
        .route("/api/dashboard/:mode", get(api::dashboard::get_dashboard_for_mode))
        // Modes
        .route("/api/modes", get(api::mode::list_modes))
        .route("/api/mode", get(api::mode::get_mode).post(api::mode::set_mode))
        // Artwork rotation
        .route("/api/art", get(api::art::get_all_art))
        .route("/api/art/:category", get(api::art::get_art))
        .route("/api/art/:category/refresh", post(api::art::refresh_art))
        .route("/api/cache/stats", get(api::cache::cache_stats))
        // Real-time delivery
        .route("/ws", get(api::ws::ws_handler))
        .route("/events", get(api::sse::event_stream))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}
