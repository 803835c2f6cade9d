//! Dashboard modes and the current-mode state
//!
//! A mode names which data categories a dashboard shows and how they are
//! filtered. The set of modes is fixed at startup; only the selection of the
//! current mode changes at runtime.

use crate::content::ContentFilters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tableau_common::events::{EventBus, TableauEvent};
use tableau_common::{Clock, Error, Result};
use tokio::sync::RwLock;
use tracing::info;

/// Number of transitions kept in the mode history
pub const HISTORY_LIMIT: usize = 10;

/// Independently fetched dashboard data categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCategory {
    Weather,
    Transit,
    Calendar,
    Tasks,
    Art,
}

impl DataCategory {
    pub const ALL: [DataCategory; 5] = [
        DataCategory::Weather,
        DataCategory::Transit,
        DataCategory::Calendar,
        DataCategory::Tasks,
        DataCategory::Art,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::Weather => "weather",
            DataCategory::Transit => "transit",
            DataCategory::Calendar => "calendar",
            DataCategory::Tasks => "tasks",
            DataCategory::Art => "art",
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named dashboard configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mode {
    pub name: String,
    #[serde(default)]
    pub includes: BTreeSet<DataCategory>,
    /// Restrict tasks to those due within the urgent window
    #[serde(default, alias = "urgent_tasks_only")]
    pub urgent_tasks_only: bool,
    /// Style filters for the art category
    #[serde(default, alias = "art_styles")]
    pub art_styles: Vec<String>,
}

impl Mode {
    pub fn new<I>(name: impl Into<String>, includes: I) -> Self
    where
        I: IntoIterator<Item = DataCategory>,
    {
        Self {
            name: name.into(),
            includes: includes.into_iter().collect(),
            urgent_tasks_only: false,
            art_styles: Vec::new(),
        }
    }

    pub fn urgent_only(mut self) -> Self {
        self.urgent_tasks_only = true;
        self
    }

    pub fn with_art_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.art_styles = styles.into_iter().map(Into::into).collect();
        self
    }

    pub fn includes(&self, category: DataCategory) -> bool {
        self.includes.contains(&category)
    }

    pub fn art_filters(&self) -> ContentFilters {
        ContentFilters::new(self.art_styles.iter().cloned())
    }

    /// Built-in modes used when the configuration defines none
    pub fn defaults() -> Vec<Mode> {
        use DataCategory::*;
        vec![
            Mode::new("dashboard", DataCategory::ALL),
            Mode::new("commute", [Weather, Transit]),
            Mode::new("gallery", [Weather, Art]),
            Mode::new("focus", [Calendar, Tasks]).urgent_only(),
        ]
    }
}

/// Statically configured modes with a default
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    modes: Vec<Mode>,
    default_index: usize,
}

impl ModeRegistry {
    /// # Errors
    /// `Error::Config` if no modes are given, names repeat, or `default_mode`
    /// is not among them.
    pub fn new(modes: Vec<Mode>, default_mode: &str) -> Result<Self> {
        if modes.is_empty() {
            return Err(Error::Config("At least one mode must be defined".to_string()));
        }
        let mut seen = BTreeSet::new();
        for mode in &modes {
            if !seen.insert(mode.name.as_str()) {
                return Err(Error::Config(format!("Duplicate mode name: {}", mode.name)));
            }
        }
        let default_index = modes
            .iter()
            .position(|m| m.name == default_mode)
            .ok_or_else(|| {
                Error::Config(format!("Default mode '{}' is not defined", default_mode))
            })?;
        Ok(Self {
            modes,
            default_index,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|m| m.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn default_mode(&self) -> &Mode {
        &self.modes[self.default_index]
    }

    /// Named mode, or the default when the name is absent or unknown
    pub fn resolve(&self, name: Option<&str>) -> &Mode {
        name.and_then(|n| self.get(n))
            .unwrap_or_else(|| self.default_mode())
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self {
            modes: Mode::defaults(),
            default_index: 0,
        }
    }
}

/// One recorded mode switch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeTransition {
    pub from: String,
    pub to: String,
    pub at: DateTime<Utc>,
    pub version: u64,
}

/// Snapshot of the mode state for API responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeStatus {
    pub current: String,
    pub version: u64,
    pub last_changed: DateTime<Utc>,
    pub history: Vec<ModeTransition>,
}

struct ModeInner {
    current: String,
    version: u64,
    last_changed: DateTime<Utc>,
    history: VecDeque<ModeTransition>,
}

/// Owned current-mode selection
///
/// Writers are serialized by the lock; readers never observe a version
/// without its matching mode name.
pub struct ModeState {
    registry: Arc<ModeRegistry>,
    inner: RwLock<ModeInner>,
    clock: Arc<dyn Clock>,
    events: Option<EventBus>,
}

impl ModeState {
    /// Start in the registry's default mode at version 0
    pub fn new(registry: Arc<ModeRegistry>, clock: Arc<dyn Clock>) -> Self {
        let inner = ModeInner {
            current: registry.default_mode().name.clone(),
            version: 0,
            last_changed: clock.now(),
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        };
        Self {
            registry,
            inner: RwLock::new(inner),
            clock,
            events: None,
        }
    }

    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn registry(&self) -> &Arc<ModeRegistry> {
        &self.registry
    }

    /// Name of the current mode
    pub async fn current(&self) -> String {
        self.inner.read().await.current.clone()
    }

    pub async fn version(&self) -> u64 {
        self.inner.read().await.version
    }

    pub async fn status(&self) -> ModeStatus {
        let inner = self.inner.read().await;
        ModeStatus {
            current: inner.current.clone(),
            version: inner.version,
            last_changed: inner.last_changed,
            history: inner.history.iter().cloned().collect(),
        }
    }

    /// Switch to `name`
    ///
    /// Re-selecting the current mode is recorded like any other transition.
    ///
    /// # Errors
    /// `Error::InvalidInput` if `name` is not a configured mode; state is
    /// unchanged.
    pub async fn set_mode(&self, name: &str) -> Result<ModeTransition> {
        if !self.registry.contains(name) {
            return Err(Error::InvalidInput(format!("Unknown mode: {}", name)));
        }

        let transition = {
            let mut inner = self.inner.write().await;
            let now = self.clock.now();
            inner.version += 1;
            let transition = ModeTransition {
                from: std::mem::replace(&mut inner.current, name.to_string()),
                to: name.to_string(),
                at: now,
                version: inner.version,
            };
            inner.last_changed = now;
            if inner.history.len() == HISTORY_LIMIT {
                inner.history.pop_front();
            }
            inner.history.push_back(transition.clone());
            transition
        };

        info!(
            from = %transition.from,
            to = %transition.to,
            version = transition.version,
            "Mode changed"
        );

        if let Some(bus) = &self.events {
            bus.emit_lossy(TableauEvent::ModeChanged {
                from: transition.from.clone(),
                to: transition.to.clone(),
                version: transition.version,
                timestamp: transition.at,
            });
        }

        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tableau_common::ManualClock;

    fn state() -> (ModeState, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let state = ModeState::new(Arc::new(ModeRegistry::default()), Arc::new(clock.clone()));
        (state, clock)
    }

    #[test]
    fn test_registry_rejects_undefined_default() {
        let result = ModeRegistry::new(Mode::defaults(), "party");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let modes = vec![
            Mode::new("a", [DataCategory::Weather]),
            Mode::new("a", [DataCategory::Art]),
        ];
        assert!(ModeRegistry::new(modes, "a").is_err());
    }

    #[test]
    fn test_unknown_mode_resolves_to_default() {
        let registry = ModeRegistry::default();
        assert_eq!(registry.resolve(Some("nonexistent")).name, "dashboard");
        assert_eq!(registry.resolve(None).name, "dashboard");
        assert_eq!(registry.resolve(Some("focus")).name, "focus");
    }

    #[test]
    fn test_mode_deserializes_from_toml() {
        let mode: Mode = toml::from_str(
            r#"
name = "morning"
includes = ["weather", "transit", "tasks"]
urgent_tasks_only = true
"#,
        )
        .unwrap();
        assert!(mode.includes(DataCategory::Transit));
        assert!(!mode.includes(DataCategory::Art));
        assert!(mode.urgent_tasks_only);
    }

    #[tokio::test]
    async fn test_set_mode_bumps_version_and_records_history() {
        let (state, clock) = state();
        assert_eq!(state.current().await, "dashboard");
        assert_eq!(state.version().await, 0);

        clock.advance_secs(5);
        let transition = state.set_mode("commute").await.unwrap();

        assert_eq!(transition.from, "dashboard");
        assert_eq!(transition.to, "commute");
        assert_eq!(transition.version, 1);

        let status = state.status().await;
        assert_eq!(status.current, "commute");
        assert_eq!(status.last_changed.timestamp_millis(), 1_005_000);
        assert_eq!(status.history, vec![transition]);
    }

    #[tokio::test]
    async fn test_set_unknown_mode_leaves_state_unchanged() {
        let (state, _) = state();
        let result = state.set_mode("party").await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(state.current().await, "dashboard");
        assert_eq!(state.version().await, 0);
        assert!(state.status().await.history.is_empty());
    }

    #[tokio::test]
    async fn test_reselecting_current_mode_is_recorded() {
        let (state, _) = state();
        let transition = state.set_mode("dashboard").await.unwrap();
        assert_eq!(transition.from, "dashboard");
        assert_eq!(transition.version, 1);
        assert_eq!(state.status().await.history.len(), 1);
    }

    #[tokio::test]
    async fn test_history_keeps_last_ten_transitions() {
        let (state, _) = state();
        for i in 0..15 {
            let name = if i % 2 == 0 { "gallery" } else { "focus" };
            state.set_mode(name).await.unwrap();
        }

        let status = state.status().await;
        assert_eq!(status.version, 15);
        assert_eq!(status.history.len(), HISTORY_LIMIT);
        assert_eq!(status.history.first().unwrap().version, 6);
        assert_eq!(status.history.last().unwrap().version, 15);
    }

    #[tokio::test]
    async fn test_set_mode_emits_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let (state, _) = state();
        let state = state.with_events(bus);

        state.set_mode("focus").await.unwrap();

        match rx.recv().await.unwrap() {
            TableauEvent::ModeChanged { from, to, version, .. } => {
                assert_eq!(from, "dashboard");
                assert_eq!(to, "focus");
                assert_eq!(version, 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
