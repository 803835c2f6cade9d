//! Todoist REST v2 active-tasks feed

use super::{check_status, http_client, Feed, FeedError};
use crate::config::TasksConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    pub due: Option<DateTime<Utc>>,
    pub completed: bool,
    /// 1 (normal) to 4 (urgent)
    pub priority: u8,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    id: String,
    content: String,
    #[serde(default)]
    is_completed: bool,
    #[serde(default = "default_priority")]
    priority: u8,
    due: Option<RawDue>,
}

fn default_priority() -> u8 {
    1
}

#[derive(Debug, Deserialize)]
struct RawDue {
    date: Option<String>,
    datetime: Option<String>,
}

/// Due instant; a date-only due means the end of that day (UTC)
fn resolve_due(due: &RawDue) -> Option<DateTime<Utc>> {
    if let Some(dt) = &due.datetime {
        if let Ok(t) = DateTime::parse_from_rfc3339(dt) {
            return Some(t.with_timezone(&Utc));
        }
        // Floating times carry no offset
        if let Ok(t) = NaiveDateTime::parse_from_str(dt, "%Y-%m-%dT%H:%M:%S") {
            return Some(t.and_utc());
        }
    }
    let date = NaiveDate::parse_from_str(due.date.as_deref()?, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(23, 59, 59)?.and_utc())
}

fn into_tasks(raw: Vec<RawTask>) -> Vec<TaskItem> {
    raw.into_iter()
        .map(|task| TaskItem {
            due: task.due.as_ref().and_then(resolve_due),
            id: task.id,
            title: task.content,
            completed: task.is_completed,
            priority: task.priority,
        })
        .collect()
}

pub struct TasksFeed {
    client: reqwest::Client,
    config: TasksConfig,
}

impl TasksFeed {
    pub fn new(config: TasksConfig) -> Result<Self, FeedError> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            config,
        })
    }
}

#[async_trait]
impl Feed<Vec<TaskItem>> for TasksFeed {
    fn name(&self) -> &'static str {
        "tasks"
    }

    async fn fetch(&self) -> Result<Vec<TaskItem>, FeedError> {
        let token = self
            .config
            .api_token
            .as_deref()
            .ok_or(FeedError::NotConfigured("Todoist token"))?;

        let mut request = self
            .client
            .get(format!("{}/tasks", self.config.base_url))
            .bearer_auth(token);
        if let Some(filter) = &self.config.filter {
            request = request.query(&[("filter", filter)]);
        }

        let raw: Vec<RawTask> = check_status(request.send().await?).await?.json().await?;
        let tasks = into_tasks(raw);
        debug!(tasks = tasks.len(), "Tasks fetched");
        Ok(tasks)
    }
}
