//! Google Calendar v3 events feed

use super::{check_status, http_client, Feed, FeedError};
use crate::config::CalendarConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tableau_common::Clock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    summary: Option<String>,
    location: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
    /// All-day events carry a bare date
    date: Option<String>,
}

impl EventTime {
    /// Instant plus whether it came from a date-only value
    fn resolve(&self) -> Option<(DateTime<Utc>, bool)> {
        if let Some(dt) = &self.date_time {
            return DateTime::parse_from_rfc3339(dt)
                .ok()
                .map(|t| (t.with_timezone(&Utc), false));
        }
        let date = NaiveDate::parse_from_str(self.date.as_deref()?, "%Y-%m-%d").ok()?;
        Some((date.and_hms_opt(0, 0, 0)?.and_utc(), true))
    }
}

fn into_events(response: EventsResponse) -> Vec<CalendarEvent> {
    response
        .items
        .into_iter()
        .filter_map(|raw| {
            let (start, all_day) = raw.start.as_ref()?.resolve()?;
            let end = raw
                .end
                .as_ref()
                .and_then(EventTime::resolve)
                .map(|(end, _)| end)
                .unwrap_or(start);
            Some(CalendarEvent {
                id: raw.id,
                title: raw.summary.unwrap_or_else(|| "(No title)".to_string()),
                location: raw.location.filter(|l| !l.trim().is_empty()),
                start,
                end,
                all_day,
            })
        })
        .collect()
}

pub struct CalendarFeed {
    client: reqwest::Client,
    config: CalendarConfig,
    clock: Arc<dyn Clock>,
}

impl CalendarFeed {
    pub fn new(config: CalendarConfig, clock: Arc<dyn Clock>) -> Result<Self, FeedError> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            config,
            clock,
        })
    }

    fn events_url(&self, calendar_id: &str) -> Result<reqwest::Url, FeedError> {
        let mut url = reqwest::Url::parse(&self.config.base_url)
            .map_err(|e| FeedError::Parse(format!("Invalid calendar base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| FeedError::Parse("Calendar base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);
        Ok(url)
    }
}

#[async_trait]
impl Feed<Vec<CalendarEvent>> for CalendarFeed {
    fn name(&self) -> &'static str {
        "calendar"
    }

    async fn fetch(&self) -> Result<Vec<CalendarEvent>, FeedError> {
        let calendar_id = self
            .config
            .calendar_id
            .as_deref()
            .ok_or(FeedError::NotConfigured("Calendar id"))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(FeedError::NotConfigured("Google Calendar API key"))?;

        let time_min = self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let params = [
            ("key", api_key.to_string()),
            ("timeMin", time_min),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", self.config.max_results.to_string()),
        ];

        let response = self
            .client
            .get(self.events_url(calendar_id)?)
            .query(&params)
            .send()
            .await?;
        let body: EventsResponse = check_status(response).await?.json().await?;

        let events = into_events(body);
        debug!(events = events.len(), "Calendar events fetched");
        Ok(events)
    }
}
