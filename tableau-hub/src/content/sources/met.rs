// Metropolitan Museum of Art collection API adapter
//
// Two-step lookup: a search returns object ids only, so a random sample of
// ids is resolved through individual object requests.

use super::{check_status, http_client, identifier, rate_limiter, text, Limiter};
use crate::config::MetConfig;
use crate::content::types::{
    CandidateQuery, ContentItem, ContentSource, Orientation, RawItem, SourceError, SourceKey,
};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: u64,
    /// `null` when nothing matched
    #[serde(default, rename = "objectIDs")]
    object_ids: Option<Vec<u64>>,
}

pub struct MetSource {
    client: reqwest::Client,
    rate_limiter: Limiter,
    config: MetConfig,
}

impl MetSource {
    pub fn new(config: MetConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(Duration::from_secs(config.timeout_seconds))?,
            rate_limiter: rate_limiter(config.requests_per_second),
            config,
        })
    }

    fn search_term(&self, query: &CandidateQuery) -> String {
        if query.styles.is_empty() {
            self.config.query.clone()
        } else {
            query.styles.join(" ")
        }
    }

    async fn search_ids(&self, term: &str) -> Result<Vec<u64>, SourceError> {
        self.rate_limiter.until_ready().await;

        let mut params: Vec<(&str, String)> = vec![
            ("hasImages", "true".to_string()),
            ("q", term.to_string()),
        ];
        if let Some(department) = self.config.department_ids.first() {
            params.push(("departmentId", department.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/search", self.config.base_url))
            .query(&params)
            .send()
            .await?;
        let search: SearchResponse = check_status(response).await?.json().await?;

        debug!(term, total = search.total, "Met search complete");
        Ok(search.object_ids.unwrap_or_default())
    }

    async fn fetch_object(&self, id: u64) -> Result<Value, SourceError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(format!("{}/objects/{}", self.config.base_url, id))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl ContentSource for MetSource {
    fn key(&self) -> SourceKey {
        SourceKey::Met
    }

    async fn search_candidates(&self, query: &CandidateQuery) -> Result<Vec<RawItem>, SourceError> {
        let term = self.search_term(query);
        let ids = self.search_ids(&term).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sample: Vec<u64> = {
            let mut rng = rand::thread_rng();
            ids.choose_multiple(&mut rng, query.limit.max(1))
                .copied()
                .collect()
        };

        let mut raw = Vec::with_capacity(sample.len());
        let mut last_error = None;
        for id in sample {
            match self.fetch_object(id).await {
                Ok(object) => raw.push(RawItem(object)),
                Err(e) => {
                    debug!(object_id = id, error = %e, "Met object lookup failed");
                    last_error = Some(e);
                }
            }
        }

        match (raw.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(raw),
        }
    }

    fn normalize(&self, raw: RawItem) -> Option<ContentItem> {
        let object = raw.0;
        let id = identifier(&object, "objectID")?;
        let image_url = text(&object, "primaryImage")?;
        let (width_cm, height_cm) = overall_dimensions(&object);

        Some(ContentItem {
            id,
            source: SourceKey::Met,
            orientation: Orientation::from_dimensions(width_cm, height_cm),
            title: text(&object, "title").unwrap_or_else(|| "Untitled".to_string()),
            artist: text(&object, "artistDisplayName"),
            date: text(&object, "objectDate"),
            image_url,
            thumbnail_url: text(&object, "primaryImageSmall"),
            detail_url: text(&object, "objectURL"),
            width: None,
            height: None,
        })
    }
}

/// Width and height in centimetres from the first measurement carrying both
fn overall_dimensions(object: &Value) -> (Option<f64>, Option<f64>) {
    let measurements = match object.get("measurements").and_then(Value::as_array) {
        Some(m) => m,
        None => return (None, None),
    };

    for measurement in measurements {
        let Some(element) = measurement.get("elementMeasurements") else {
            continue;
        };
        let width = element.get("Width").and_then(super::dimension);
        let height = element.get("Height").and_then(super::dimension);
        if width.is_some() && height.is_some() {
            return (width, height);
        }
    }
    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> MetSource {
        MetSource::new(MetConfig::default()).unwrap()
    }

    fn object() -> Value {
        json!({
            "objectID": 436535,
            "title": "Wheat Field with Cypresses",
            "artistDisplayName": "Vincent van Gogh",
            "objectDate": "1889",
            "primaryImage": "https://images.metmuseum.org/CRDImages/ep/original/DT1567.jpg",
            "primaryImageSmall": "https://images.metmuseum.org/CRDImages/ep/web-large/DT1567.jpg",
            "objectURL": "https://www.metmuseum.org/art/collection/search/436535",
            "measurements": [
                {"elementName": "Frame", "elementMeasurements": {"Depth": 8.9}},
                {"elementName": "Overall", "elementMeasurements": {"Height": 73.2, "Width": 93.4}}
            ]
        })
    }

    #[test]
    fn test_normalize_full_object() {
        let item = source().normalize(RawItem(object())).unwrap();

        assert_eq!(item.id, "436535");
        assert_eq!(item.source, SourceKey::Met);
        assert_eq!(item.orientation, Orientation::Landscape);
        assert_eq!(item.artist.as_deref(), Some("Vincent van Gogh"));
        assert_eq!(item.date.as_deref(), Some("1889"));
        assert!(item.thumbnail_url.unwrap().contains("web-large"));
    }

    #[test]
    fn test_normalize_rejects_object_without_image() {
        let mut raw = object();
        raw["primaryImage"] = json!("");
        assert!(source().normalize(RawItem(raw)).is_none());
    }

    #[test]
    fn test_missing_measurements_means_no_orientation() {
        let mut raw = object();
        raw.as_object_mut().unwrap().remove("measurements");
        let item = source().normalize(RawItem(raw)).unwrap();
        assert_eq!(item.orientation, Orientation::None);
    }

    #[test]
    fn test_search_term_prefers_styles() {
        let met = source();
        let query = CandidateQuery {
            orientation: Orientation::None,
            styles: vec!["impressionism".to_string()],
            limit: 4,
        };
        assert_eq!(met.search_term(&query), "impressionism");

        let query = CandidateQuery {
            styles: Vec::new(),
            ..query
        };
        assert_eq!(met.search_term(&query), MetConfig::default().query);
    }

    #[test]
    fn test_search_response_tolerates_null_ids() {
        let parsed: SearchResponse =
            serde_json::from_value(json!({"total": 0, "objectIDs": null})).unwrap();
        assert!(parsed.object_ids.is_none());
    }
}
