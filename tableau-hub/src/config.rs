//! Hub configuration
//!
//! **Resolution:** CLI `--config` → `TABLEAU_CONFIG` → user config file →
//! `/etc/tableau/config.toml` → compiled defaults. Every section and field
//! is optional; anything omitted keeps its default.
//!
//! **Secrets:** provider keys resolve from the environment first
//! (`TABLEAU_MBTA_API_KEY`, `TABLEAU_GOOGLE_API_KEY`, `TABLEAU_TODOIST_TOKEN`),
//! then from the TOML file.

use crate::aggregator::modes::{Mode, ModeRegistry};
use crate::content::{ContentItem, FetchSettings, RotationCategory, SourceKey, SourceWeight};
use serde::Deserialize;
use std::path::Path;
use tableau_common::config::{
    load_toml_or_default, resolve_secret, CacheConfig, ConfigResolver, LoggingConfig, ServerConfig,
};
use tableau_common::time::millis_to_duration;
use tableau_common::{Error, Result};

pub const APP_NAME: &str = "tableau";

pub const MBTA_API_KEY_ENV: &str = "TABLEAU_MBTA_API_KEY";
pub const GOOGLE_API_KEY_ENV: &str = "TABLEAU_GOOGLE_API_KEY";
pub const TODOIST_TOKEN_ENV: &str = "TABLEAU_TODOIST_TOKEN";

/// Complete hub configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub rotation: RotationConfig,
    pub sources: SourcesConfig,
    pub feeds: FeedsConfig,
    pub modes: ModesConfig,
    pub jobs: JobsConfig,
    pub aggregator: AggregatorConfig,
}

impl HubConfig {
    /// Resolve, load, apply secrets and validate
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = ConfigResolver::new(APP_NAME).resolve(cli_path);
        let mut config: HubConfig = load_toml_or_default(path.as_deref())?;
        config.resolve_secrets();
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment secrets onto the TOML values
    pub fn resolve_secrets(&mut self) {
        let transit = &mut self.feeds.transit;
        transit.api_key = resolve_secret(MBTA_API_KEY_ENV, transit.api_key.as_deref(), "MBTA API key");

        let calendar = &mut self.feeds.calendar;
        calendar.api_key = resolve_secret(
            GOOGLE_API_KEY_ENV,
            calendar.api_key.as_deref(),
            "Google Calendar API key",
        );

        let tasks = &mut self.feeds.tasks;
        tasks.api_token = resolve_secret(TODOIST_TOKEN_ENV, tasks.api_token.as_deref(), "Todoist token");
    }

    /// Reject settings that would stall rotation or leave modes unresolvable
    pub fn validate(&self) -> Result<()> {
        if self.rotation.categories.is_empty() {
            return Err(Error::Config(
                "rotation.categories must define at least one category".to_string(),
            ));
        }
        for cat in &self.rotation.categories {
            if cat.interval_seconds == 0 {
                return Err(Error::Config(format!(
                    "rotation category '{}' has a zero interval",
                    cat.name
                )));
            }
            if cat.pool_size == 0 {
                return Err(Error::Config(format!(
                    "rotation category '{}' has a zero pool size",
                    cat.name
                )));
            }
        }
        if self.rotation.fetch_attempts == 0 || self.rotation.attempt_multiplier == 0 {
            return Err(Error::Config(
                "rotation.fetch_attempts and rotation.attempt_multiplier must be positive"
                    .to_string(),
            ));
        }
        if self.rotation.pool_ttl_seconds <= 0 {
            return Err(Error::Config(
                "rotation.pool_ttl_seconds must be positive".to_string(),
            ));
        }
        if self.jobs.pool_refresh_interval_seconds == Some(0) {
            return Err(Error::Config(
                "jobs.pool_refresh_interval_seconds must be positive".to_string(),
            ));
        }
        if self.aggregator.calendar_lookahead_events == 0 {
            return Err(Error::Config(
                "aggregator.calendar_lookahead_events must be positive".to_string(),
            ));
        }
        if self.jobs.event_bus_capacity == 0 {
            return Err(Error::Config(
                "jobs.event_bus_capacity must be positive".to_string(),
            ));
        }
        if self.jobs.broadcast_interval_seconds == 0 {
            return Err(Error::Config(
                "jobs.broadcast_interval_seconds must be positive".to_string(),
            ));
        }
        if self.cache.sweep_interval_seconds == 0 {
            return Err(Error::Config(
                "cache.sweep_interval_seconds must be positive".to_string(),
            ));
        }
        self.modes.registry().map(|_| ())
    }
}

// ============================================================================
// Rotation
// ============================================================================

/// Placeholder served when no artwork can be produced
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnavailableConfig {
    pub title: String,
    pub image_url: String,
}

impl Default for UnavailableConfig {
    fn default() -> Self {
        Self {
            title: "Artwork unavailable".to_string(),
            image_url: "/static/unavailable.png".to_string(),
        }
    }
}

impl UnavailableConfig {
    pub fn item(&self) -> ContentItem {
        ContentItem::unavailable(self.title.clone(), self.image_url.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub pool_ttl_seconds: i64,
    pub retry_delay_ms: u64,
    pub fetch_attempts: u32,
    pub attempt_multiplier: u32,
    /// Raw candidates requested per adapter call
    pub candidate_batch: usize,
    pub categories: Vec<RotationCategory>,
    pub unavailable: UnavailableConfig,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            pool_ttl_seconds: 3600,
            retry_delay_ms: 500,
            fetch_attempts: 3,
            attempt_multiplier: 4,
            candidate_batch: 8,
            categories: RotationCategory::defaults(),
            unavailable: UnavailableConfig::default(),
        }
    }
}

impl RotationConfig {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            retry_delay: millis_to_duration(self.retry_delay_ms),
            fetch_attempts: self.fetch_attempts,
            attempt_multiplier: self.attempt_multiplier,
            candidate_batch: self.candidate_batch,
        }
    }
}

// ============================================================================
// Content sources
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub met: MetConfig,
    pub artic: ArticConfig,
    pub cleveland: ClevelandConfig,
}

impl SourcesConfig {
    /// Weight table entries in configured order
    pub fn weights(&self) -> Vec<SourceWeight> {
        vec![
            SourceWeight {
                key: SourceKey::Met,
                weight: self.met.weight,
                enabled: self.met.enabled,
            },
            SourceWeight {
                key: SourceKey::Artic,
                weight: self.artic.weight,
                enabled: self.artic.enabled,
            },
            SourceWeight {
                key: SourceKey::Cleveland,
                weight: self.cleveland.weight,
                enabled: self.cleveland.enabled,
            },
        ]
    }
}

/// Metropolitan Museum of Art
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetConfig {
    pub enabled: bool,
    pub weight: u32,
    pub base_url: String,
    /// Search term used when no style filter applies
    pub query: String,
    /// Restrict search to these departments (first one is used)
    pub department_ids: Vec<u32>,
    pub requests_per_second: u32,
    pub timeout_seconds: u64,
}

impl Default for MetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 35,
            base_url: "https://collectionapi.metmuseum.org/public/collection/v1".to_string(),
            query: "painting".to_string(),
            // European Paintings
            department_ids: vec![11],
            requests_per_second: 10,
            timeout_seconds: 10,
        }
    }
}

/// Art Institute of Chicago
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArticConfig {
    pub enabled: bool,
    pub weight: u32,
    pub base_url: String,
    pub query: String,
    /// Upper bound of the random result page
    pub max_page: u32,
    pub requests_per_second: u32,
    pub timeout_seconds: u64,
}

impl Default for ArticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 35,
            base_url: "https://api.artic.edu/api/v1".to_string(),
            query: "painting".to_string(),
            max_page: 10,
            requests_per_second: 5,
            timeout_seconds: 10,
        }
    }
}

/// Cleveland Museum of Art
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClevelandConfig {
    pub enabled: bool,
    pub weight: u32,
    pub base_url: String,
    pub artwork_type: String,
    /// Upper bound of the random result offset
    pub max_skip: u32,
    pub requests_per_second: u32,
    pub timeout_seconds: u64,
}

impl Default for ClevelandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 20,
            base_url: "https://openaccess-api.clevelandart.org/api".to_string(),
            artwork_type: "Painting".to_string(),
            max_skip: 1000,
            requests_per_second: 5,
            timeout_seconds: 10,
        }
    }
}

// ============================================================================
// Data feeds
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub weather: WeatherConfig,
    pub transit: TransitConfig,
    pub calendar: CalendarConfig,
    pub tasks: TasksConfig,
}

/// Open-Meteo forecast
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// `fahrenheit` or `celsius`
    pub temperature_unit: String,
    /// `mph`, `kmh`, `ms` or `kn`
    pub wind_speed_unit: String,
    pub forecast_days: u32,
    pub base_url: String,
    pub ttl_seconds: i64,
    pub timeout_seconds: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            temperature_unit: "fahrenheit".to_string(),
            wind_speed_unit: "mph".to_string(),
            forecast_days: 3,
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            ttl_seconds: 600,
            timeout_seconds: 10,
        }
    }
}

/// MBTA v3 predictions
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    pub stop_id: Option<String>,
    pub api_key: Option<String>,
    pub base_url: String,
    /// Predictions requested per call
    pub page_limit: u32,
    pub ttl_seconds: i64,
    pub timeout_seconds: u64,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            stop_id: None,
            api_key: None,
            base_url: "https://api-v3.mbta.com".to_string(),
            page_limit: 20,
            ttl_seconds: 30,
            timeout_seconds: 5,
        }
    }
}

/// Google Calendar v3
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub calendar_id: Option<String>,
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_results: u32,
    pub ttl_seconds: i64,
    pub timeout_seconds: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: None,
            api_key: None,
            base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            max_results: 20,
            ttl_seconds: 300,
            timeout_seconds: 10,
        }
    }
}

/// Todoist REST v2
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub api_token: Option<String>,
    pub base_url: String,
    /// Todoist filter expression, e.g. `today | overdue`
    pub filter: Option<String>,
    pub ttl_seconds: i64,
    pub timeout_seconds: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: "https://api.todoist.com/rest/v2".to_string(),
            filter: None,
            ttl_seconds: 120,
            timeout_seconds: 10,
        }
    }
}

// ============================================================================
// Modes, jobs, aggregation
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModesConfig {
    pub default: String,
    pub definitions: Vec<Mode>,
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            default: "dashboard".to_string(),
            definitions: Mode::defaults(),
        }
    }
}

impl ModesConfig {
    pub fn registry(&self) -> Result<ModeRegistry> {
        ModeRegistry::new(self.definitions.clone(), &self.default)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Snapshot publisher period
    pub broadcast_interval_seconds: u64,
    /// Pool refresher period; defaults to `rotation.pool_ttl_seconds`
    pub pool_refresh_interval_seconds: Option<u64>,
    pub event_bus_capacity: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_seconds: 30,
            pool_refresh_interval_seconds: None,
            event_bus_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Lookahead for the urgent task filter
    pub urgent_window_hours: i64,
    pub calendar_lookahead_events: usize,
    pub transit_max_arrivals: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            urgent_window_hours: 24,
            calendar_lookahead_events: 5,
            transit_max_arrivals: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = HubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 5740);
        assert_eq!(config.rotation.pool_ttl_seconds, 3600);
        assert_eq!(config.jobs.broadcast_interval_seconds, 30);
    }

    #[test]
    fn test_default_weights() {
        let weights = SourcesConfig::default().weights();
        let values: Vec<(SourceKey, u32)> = weights.iter().map(|w| (w.key, w.weight)).collect();
        assert_eq!(
            values,
            vec![
                (SourceKey::Met, 35),
                (SourceKey::Artic, 35),
                (SourceKey::Cleveland, 20)
            ]
        );
        assert!(weights.iter().all(|w| w.enabled));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = HubConfig::default();
        config.rotation.categories[0].interval_seconds = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_non_positive_pool_ttl_rejected() {
        let mut config = HubConfig::default();
        config.rotation.pool_ttl_seconds = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.rotation.pool_ttl_seconds = -30;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_pool_refresh_interval_rejected() {
        let mut config = HubConfig::default();
        config.jobs.pool_refresh_interval_seconds = Some(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.jobs.pool_refresh_interval_seconds = Some(600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_event_bus_capacity_rejected() {
        let mut config = HubConfig::default();
        config.jobs.event_bus_capacity = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_calendar_lookahead_rejected() {
        let mut config = HubConfig::default();
        config.aggregator.calendar_lookahead_events = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let mut config = HubConfig::default();
        config.rotation.categories[1].pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_undefined_default_mode_rejected() {
        let mut config = HubConfig::default();
        config.modes.default = "party".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_sections() {
        let config: HubConfig = toml::from_str(
            r#"
[rotation]
pool_ttl_seconds = 1800

[[rotation.categories]]
name = "portrait"
orientation = "portrait"
interval_seconds = 60
pool_size = 4

[sources.cleveland]
enabled = false

[feeds.weather]
latitude = 42.36
longitude = -71.06

[modes]
default = "morning"

[[modes.definitions]]
name = "morning"
includes = ["weather", "transit"]
"#,
        )
        .unwrap();

        assert_eq!(config.rotation.pool_ttl_seconds, 1800);
        assert_eq!(config.rotation.retry_delay_ms, 500);
        assert_eq!(config.rotation.categories.len(), 1);
        assert_eq!(config.rotation.categories[0].interval_seconds, 60);
        assert!(!config.sources.cleveland.enabled);
        assert_eq!(config.sources.cleveland.weight, 20);
        assert_eq!(config.feeds.weather.latitude, Some(42.36));
        assert_eq!(config.feeds.weather.ttl_seconds, 600);
        assert!(config.validate().is_ok());
    }
}
