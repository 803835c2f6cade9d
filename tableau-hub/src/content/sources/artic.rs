// Art Institute of Chicago API adapter
//
// Search results carry an `image_id` that resolves through the IIIF image
// server announced in the response's `config.iiif_url`.

use super::{check_status, dimension, http_client, identifier, rate_limiter, text, Limiter};
use crate::config::ArticConfig;
use crate::content::types::{
    CandidateQuery, ContentItem, ContentSource, Orientation, RawItem, SourceError, SourceKey,
};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const FIELDS: &str = "id,title,artist_display,date_display,image_id,thumbnail";
const DEFAULT_IIIF_URL: &str = "https://www.artic.edu/iiif/2";
const DETAIL_BASE_URL: &str = "https://www.artic.edu/artworks";

/// Key injected into each raw record so `normalize` can build image URLs
const IIIF_KEY: &str = "_iiif_url";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    config: Option<ResponseConfig>,
}

#[derive(Debug, Deserialize)]
struct ResponseConfig {
    iiif_url: Option<String>,
}

pub struct ArticSource {
    client: reqwest::Client,
    rate_limiter: Limiter,
    config: ArticConfig,
}

impl ArticSource {
    pub fn new(config: ArticConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(Duration::from_secs(config.timeout_seconds))?,
            rate_limiter: rate_limiter(config.requests_per_second),
            config,
        })
    }

    fn search_params(&self, query: &CandidateQuery, page: u32) -> Vec<(&'static str, String)> {
        let term = if query.styles.is_empty() {
            self.config.query.clone()
        } else {
            query.styles.join(" ")
        };
        vec![
            ("q", term),
            ("query[term][is_public_domain]", "true".to_string()),
            ("fields", FIELDS.to_string()),
            ("limit", query.limit.max(1).to_string()),
            ("page", page.to_string()),
        ]
    }
}

#[async_trait]
impl ContentSource for ArticSource {
    fn key(&self) -> SourceKey {
        SourceKey::Artic
    }

    async fn search_candidates(&self, query: &CandidateQuery) -> Result<Vec<RawItem>, SourceError> {
        let page = rand::thread_rng().gen_range(1..=self.config.max_page.max(1));
        let params = self.search_params(query, page);

        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .get(format!("{}/artworks/search", self.config.base_url))
            .query(&params)
            .send()
            .await?;
        let search: SearchResponse = check_status(response).await?.json().await?;

        let iiif_url = search
            .config
            .and_then(|c| c.iiif_url)
            .unwrap_or_else(|| DEFAULT_IIIF_URL.to_string());

        debug!(page, results = search.data.len(), "Artic search complete");

        Ok(search
            .data
            .into_iter()
            .map(|mut record| {
                if let Some(obj) = record.as_object_mut() {
                    obj.insert(IIIF_KEY.to_string(), Value::String(iiif_url.clone()));
                }
                RawItem(record)
            })
            .collect())
    }

    fn normalize(&self, raw: RawItem) -> Option<ContentItem> {
        let record = raw.0;
        let id = identifier(&record, "id")?;
        let image_id = text(&record, "image_id")?;
        let iiif = text(&record, IIIF_KEY).unwrap_or_else(|| DEFAULT_IIIF_URL.to_string());

        let thumbnail = record.get("thumbnail");
        let width = thumbnail.and_then(|t| t.get("width")).and_then(dimension);
        let height = thumbnail.and_then(|t| t.get("height")).and_then(dimension);

        Some(ContentItem {
            detail_url: Some(format!("{}/{}", DETAIL_BASE_URL, id)),
            id,
            source: SourceKey::Artic,
            orientation: Orientation::from_dimensions(width, height),
            title: text(&record, "title").unwrap_or_else(|| "Untitled".to_string()),
            artist: text(&record, "artist_display"),
            date: text(&record, "date_display"),
            image_url: format!("{}/{}/full/843,/0/default.jpg", iiif, image_id),
            thumbnail_url: Some(format!("{}/{}/full/200,/0/default.jpg", iiif, image_id)),
            width: width.map(|w| w as u32),
            height: height.map(|h| h as u32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> ArticSource {
        ArticSource::new(ArticConfig::default()).unwrap()
    }

    fn record() -> Value {
        json!({
            "id": 27992,
            "title": "A Sunday on La Grande Jatte",
            "artist_display": "Georges Seurat\nFrench, 1859-1891",
            "date_display": "1884-86",
            "image_id": "2d484387-2509-5e8e-2c43-22f9981972eb",
            "thumbnail": {"width": 3000, "height": 2016},
            "_iiif_url": "https://www.artic.edu/iiif/2"
        })
    }

    #[test]
    fn test_normalize_builds_iiif_urls() {
        let item = source().normalize(RawItem(record())).unwrap();

        assert_eq!(item.id, "27992");
        assert_eq!(
            item.image_url,
            "https://www.artic.edu/iiif/2/2d484387-2509-5e8e-2c43-22f9981972eb/full/843,/0/default.jpg"
        );
        assert_eq!(item.orientation, Orientation::Landscape);
        assert_eq!(item.width, Some(3000));
        assert_eq!(
            item.detail_url.as_deref(),
            Some("https://www.artic.edu/artworks/27992")
        );
    }

    #[test]
    fn test_normalize_rejects_record_without_image() {
        let mut raw = record();
        raw["image_id"] = Value::Null;
        assert!(source().normalize(RawItem(raw)).is_none());
    }

    #[test]
    fn test_search_params_restrict_to_public_domain() {
        let query = CandidateQuery {
            orientation: Orientation::Portrait,
            styles: vec!["cubism".to_string()],
            limit: 8,
        };
        let params = source().search_params(&query, 3);

        assert!(params.contains(&("q", "cubism".to_string())));
        assert!(params.contains(&("query[term][is_public_domain]", "true".to_string())));
        assert!(params.contains(&("page", "3".to_string())));
        assert!(params.contains(&("limit", "8".to_string())));
    }
}
