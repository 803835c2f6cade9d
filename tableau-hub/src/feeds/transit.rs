//! MBTA v3 predictions feed
//!
//! The API speaks JSON:API; route names live in the `included` array and are
//! joined to predictions through `relationships.route.data.id`.

use super::{check_status, http_client, Feed, FeedError};
use crate::config::TransitConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One predicted vehicle arrival at the configured stop
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitArrival {
    pub route: String,
    pub destination: Option<String>,
    pub arrival: DateTime<Utc>,
    pub status: Option<String>,
    /// Filled in relative to the aggregation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_away: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PredictionDocument {
    #[serde(default)]
    data: Vec<Prediction>,
    #[serde(default)]
    included: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    attributes: PredictionAttributes,
    #[serde(default)]
    relationships: Option<Relationships>,
}

#[derive(Debug, Deserialize)]
struct PredictionAttributes {
    arrival_time: Option<String>,
    departure_time: Option<String>,
    direction_id: Option<usize>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Relationships {
    route: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    data: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    #[serde(default)]
    attributes: RouteAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RouteAttributes {
    short_name: Option<String>,
    long_name: Option<String>,
    direction_destinations: Vec<Option<String>>,
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn into_arrivals(doc: PredictionDocument) -> Vec<TransitArrival> {
    let routes: HashMap<&str, &RouteAttributes> = doc
        .included
        .iter()
        .filter(|r| r.kind == "route")
        .map(|r| (r.id.as_str(), &r.attributes))
        .collect();

    doc.data
        .iter()
        .filter_map(|prediction| {
            let attrs = &prediction.attributes;
            let arrival = attrs
                .arrival_time
                .as_deref()
                .or(attrs.departure_time.as_deref())
                .and_then(parse_time)?;

            let route_id = prediction
                .relationships
                .as_ref()
                .and_then(|r| r.route.as_ref())
                .and_then(|r| r.data.as_ref())
                .map(|d| d.id.as_str())
                .unwrap_or("unknown");
            let route = routes.get(route_id);

            let name = route
                .and_then(|r| r.short_name.clone().filter(|s| !s.is_empty()))
                .or_else(|| route.and_then(|r| r.long_name.clone()))
                .unwrap_or_else(|| route_id.to_string());
            let destination = route.and_then(|r| {
                attrs
                    .direction_id
                    .and_then(|d| r.direction_destinations.get(d).cloned().flatten())
            });

            Some(TransitArrival {
                route: name,
                destination,
                arrival,
                status: attrs.status.clone(),
                minutes_away: None,
            })
        })
        .collect()
}

pub struct TransitFeed {
    client: reqwest::Client,
    config: TransitConfig,
}

impl TransitFeed {
    pub fn new(config: TransitConfig) -> Result<Self, FeedError> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            config,
        })
    }
}

#[async_trait]
impl Feed<Vec<TransitArrival>> for TransitFeed {
    fn name(&self) -> &'static str {
        "transit"
    }

    async fn fetch(&self) -> Result<Vec<TransitArrival>, FeedError> {
        let stop = self
            .config
            .stop_id
            .as_deref()
            .ok_or(FeedError::NotConfigured("Transit stop"))?;

        let params = [
            ("filter[stop]", stop.to_string()),
            ("include", "route".to_string()),
            ("sort", "arrival_time".to_string()),
            ("page[limit]", self.config.page_limit.to_string()),
        ];

        let mut request = self
            .client
            .get(format!("{}/predictions", self.config.base_url))
            .query(&params);
        // Works without a key at a lower rate limit
        if let Some(key) = &self.config.api_key {
            request = request.header("x-api-key", key);
        }

        let doc: PredictionDocument = check_status(request.send().await?).await?.json().await?;
        let arrivals = into_arrivals(doc);
        debug!(stop, arrivals = arrivals.len(), "Transit predictions fetched");
        Ok(arrivals)
    }
}
