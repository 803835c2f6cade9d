//! Mode-filtered, partial-failure aggregation
//!
//! One aggregation resolves a mode, fetches every category the mode includes
//! concurrently, and folds the outcomes into a [`CompositeResult`]. A failing
//! category becomes an entry in `errors`; the result itself is always a
//! success. Categories the mode excludes are simply absent.

pub mod filters;
pub mod modes;

pub use filters::CalendarView;
pub use modes::{DataCategory, Mode, ModeRegistry, ModeState, ModeStatus, ModeTransition};

use crate::config::AggregatorConfig;
use crate::content::{ContentItem, RotationManager};
use crate::feeds::{CalendarEvent, Feed, TaskItem, TransitArrival, WeatherReport};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tableau_common::{CacheStats, Clock};
use tracing::{debug, warn};

/// Data feeds consumed by the aggregator
#[derive(Clone)]
pub struct Feeds {
    pub weather: Arc<dyn Feed<WeatherReport>>,
    pub transit: Arc<dyn Feed<Vec<TransitArrival>>>,
    pub calendar: Arc<dyn Feed<Vec<CalendarEvent>>>,
    pub tasks: Arc<dyn Feed<Vec<TaskItem>>>,
}

impl Feeds {
    /// Cache counters of every cached feed, by feed name
    pub fn cache_stats(&self) -> BTreeMap<&'static str, CacheStats> {
        [
            (self.weather.name(), self.weather.cache_stats()),
            (self.transit.name(), self.transit.cache_stats()),
            (self.calendar.name(), self.calendar.cache_stats()),
            (self.tasks.name(), self.tasks.cache_stats()),
        ]
        .into_iter()
        .filter_map(|(name, stats)| stats.map(|s| (name, s)))
        .collect()
    }

    /// Forget every memoized feed result
    pub fn invalidate_all(&self) {
        self.weather.invalidate();
        self.transit.invalidate();
        self.calendar.invalidate();
        self.tasks.invalidate();
    }
}

/// Post-processing limits
#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    pub urgent_window: Duration,
    pub calendar_lookahead: usize,
    pub transit_max: usize,
}

impl From<&AggregatorConfig> for AggregatorSettings {
    fn from(config: &AggregatorConfig) -> Self {
        Self {
            urgent_window: Duration::hours(config.urgent_window_hours),
            calendar_lookahead: config.calendar_lookahead_events,
            transit_max: config.transit_max_arrivals,
        }
    }
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::from(&AggregatorConfig::default())
    }
}

/// One composed dashboard snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResult {
    pub success: bool,
    /// Resolved mode name (the default when an unknown mode was requested)
    pub mode: String,
    /// Mode-state version at aggregation time
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transit: Option<Vec<TransitArrival>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<CalendarView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskItem>>,
    /// Current artwork per rotation category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art: Option<BTreeMap<String, ContentItem>>,
    /// Failure message per category
    pub errors: BTreeMap<String, String>,
}

impl CompositeResult {
    fn empty(mode: &str, version: u64, generated_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            mode: mode.to_string(),
            version,
            generated_at,
            weather: None,
            transit: None,
            calendar: None,
            tasks: None,
            art: None,
            errors: BTreeMap::new(),
        }
    }

    fn apply(&mut self, data: CategoryData) {
        match data {
            CategoryData::Weather(w) => self.weather = Some(w),
            CategoryData::Transit(t) => self.transit = Some(t),
            CategoryData::Calendar(c) => self.calendar = Some(c),
            CategoryData::Tasks(t) => self.tasks = Some(t),
            CategoryData::Art(a) => self.art = Some(a),
        }
    }
}

enum CategoryData {
    Weather(WeatherReport),
    Transit(Vec<TransitArrival>),
    Calendar(CalendarView),
    Tasks(Vec<TaskItem>),
    Art(BTreeMap<String, ContentItem>),
}

/// Composes feeds and artwork rotation into mode-filtered snapshots
pub struct Aggregator {
    modes: Arc<ModeState>,
    feeds: Feeds,
    rotation: Arc<RotationManager>,
    clock: Arc<dyn Clock>,
    settings: AggregatorSettings,
}

impl Aggregator {
    pub fn new(
        modes: Arc<ModeState>,
        feeds: Feeds,
        rotation: Arc<RotationManager>,
        clock: Arc<dyn Clock>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            modes,
            feeds,
            rotation,
            clock,
            settings,
        }
    }

    pub fn modes(&self) -> &Arc<ModeState> {
        &self.modes
    }

    pub fn feeds(&self) -> &Feeds {
        &self.feeds
    }

    pub fn rotation(&self) -> &Arc<RotationManager> {
        &self.rotation
    }

    /// Snapshot for `mode_name`, or the default mode if absent or unknown
    ///
    /// Never fails; per-category failures are reported in `errors`.
    pub async fn aggregate(&self, mode_name: Option<&str>) -> CompositeResult {
        let mode = self.modes.registry().resolve(mode_name);
        if let Some(requested) = mode_name {
            if requested != mode.name {
                debug!(requested, resolved = %mode.name, "Unknown mode, using default");
            }
        }

        let now = self.clock.now();
        let version = self.modes.version().await;

        let fetches = DataCategory::ALL
            .into_iter()
            .filter(|c| mode.includes(*c))
            .map(move |c| async move { (c, self.fetch_category(c, mode, now).await) });
        let outcomes = join_all(fetches).await;

        let mut result = CompositeResult::empty(&mode.name, version, now);
        for (category, outcome) in outcomes {
            match outcome {
                Ok(data) => result.apply(data),
                Err(message) => {
                    warn!(%category, mode = %mode.name, error = %message, "Category fetch failed");
                    result.errors.insert(category.to_string(), message);
                }
            }
        }
        result
    }

    /// Snapshot for the current mode
    pub async fn aggregate_current(&self) -> CompositeResult {
        let current = self.modes.current().await;
        self.aggregate(Some(&current)).await
    }

    async fn fetch_category(
        &self,
        category: DataCategory,
        mode: &Mode,
        now: DateTime<Utc>,
    ) -> Result<CategoryData, String> {
        let settings = &self.settings;
        match category {
            DataCategory::Weather => self
                .feeds
                .weather
                .fetch()
                .await
                .map(CategoryData::Weather)
                .map_err(|e| e.to_string()),
            DataCategory::Transit => self
                .feeds
                .transit
                .fetch()
                .await
                .map(|arrivals| {
                    CategoryData::Transit(filters::upcoming_arrivals(
                        &arrivals,
                        now,
                        settings.transit_max,
                    ))
                })
                .map_err(|e| e.to_string()),
            DataCategory::Calendar => self
                .feeds
                .calendar
                .fetch()
                .await
                .map(|events| {
                    CategoryData::Calendar(filters::calendar_view(
                        &events,
                        now,
                        settings.calendar_lookahead,
                    ))
                })
                .map_err(|e| e.to_string()),
            DataCategory::Tasks => self
                .feeds
                .tasks
                .fetch()
                .await
                .map(|tasks| {
                    CategoryData::Tasks(if mode.urgent_tasks_only {
                        filters::urgent_tasks(&tasks, now, settings.urgent_window)
                    } else {
                        filters::open_tasks(&tasks)
                    })
                })
                .map_err(|e| e.to_string()),
            DataCategory::Art => Ok(CategoryData::Art(
                self.rotation.get_all(&mode.art_filters()).await,
            )),
        }
    }
}
