// Cleveland Museum of Art open-access API adapter

use super::{check_status, dimension, http_client, identifier, rate_limiter, text, Limiter};
use crate::config::ClevelandConfig;
use crate::content::types::{
    CandidateQuery, ContentItem, ContentSource, Orientation, RawItem, SourceError, SourceKey,
};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Value>,
}

pub struct ClevelandSource {
    client: reqwest::Client,
    rate_limiter: Limiter,
    config: ClevelandConfig,
}

impl ClevelandSource {
    pub fn new(config: ClevelandConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(Duration::from_secs(config.timeout_seconds))?,
            rate_limiter: rate_limiter(config.requests_per_second),
            config,
        })
    }

    fn search_params(&self, query: &CandidateQuery, skip: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("has_image", "1".to_string()),
            ("cc0", "1".to_string()),
            ("type", self.config.artwork_type.clone()),
            ("limit", query.limit.max(1).to_string()),
            ("skip", skip.to_string()),
        ];
        if !query.styles.is_empty() {
            params.push(("q", query.styles.join(" ")));
        }
        params
    }
}

#[async_trait]
impl ContentSource for ClevelandSource {
    fn key(&self) -> SourceKey {
        SourceKey::Cleveland
    }

    async fn search_candidates(&self, query: &CandidateQuery) -> Result<Vec<RawItem>, SourceError> {
        let skip = rand::thread_rng().gen_range(0..=self.config.max_skip);
        let params = self.search_params(query, skip);

        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .get(format!("{}/artworks/", self.config.base_url))
            .query(&params)
            .send()
            .await?;
        let search: SearchResponse = check_status(response).await?.json().await?;

        debug!(skip, results = search.data.len(), "Cleveland search complete");
        Ok(search.data.into_iter().map(RawItem).collect())
    }

    fn normalize(&self, raw: RawItem) -> Option<ContentItem> {
        let record = raw.0;
        let id = identifier(&record, "id")?;
        let web = record.get("images").and_then(|i| i.get("web"))?;
        let image_url = text(web, "url")?;
        let width = web.get("width").and_then(dimension);
        let height = web.get("height").and_then(dimension);

        let artist = record
            .get("creators")
            .and_then(Value::as_array)
            .and_then(|creators| creators.first())
            .and_then(|creator| text(creator, "description"));

        Some(ContentItem {
            id,
            source: SourceKey::Cleveland,
            orientation: Orientation::from_dimensions(width, height),
            title: text(&record, "title").unwrap_or_else(|| "Untitled".to_string()),
            artist,
            date: text(&record, "creation_date"),
            image_url,
            thumbnail_url: None,
            detail_url: text(&record, "url"),
            width: width.map(|w| w as u32),
            height: height.map(|h| h as u32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> ClevelandSource {
        ClevelandSource::new(ClevelandConfig::default()).unwrap()
    }

    #[test]
    fn test_normalize_accepts_string_dimensions() {
        let raw = json!({
            "id": 135382,
            "title": "Water Lilies (Agapanthus)",
            "creation_date": "c. 1915-1926",
            "url": "https://clevelandart.org/art/1960.81",
            "creators": [{"description": "Claude Monet (French, 1840-1926)"}],
            "images": {"web": {
                "url": "https://openaccess-cdn.clevelandart.org/1960.81/1960.81_web.jpg",
                "width": "1263",
                "height": "600"
            }}
        });

        let item = source().normalize(RawItem(raw)).unwrap();

        assert_eq!(item.id, "135382");
        assert_eq!(item.orientation, Orientation::Landscape);
        assert_eq!(item.width, Some(1263));
        assert_eq!(item.artist.as_deref(), Some("Claude Monet (French, 1840-1926)"));
    }

    #[test]
    fn test_normalize_rejects_record_without_web_image() {
        let raw = json!({"id": 1, "title": "No image", "images": {}});
        assert!(source().normalize(RawItem(raw)).is_none());
    }

    #[test]
    fn test_search_params_default_to_paintings() {
        let query = CandidateQuery {
            orientation: Orientation::None,
            styles: Vec::new(),
            limit: 8,
        };
        let params = source().search_params(&query, 40);

        assert!(params.contains(&("type", "Painting".to_string())));
        assert!(params.contains(&("has_image", "1".to_string())));
        assert!(params.contains(&("skip", "40".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "q"));
    }
}
