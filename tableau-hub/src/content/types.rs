//! Content model and the source adapter contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Identity and tags
// ============================================================================

/// Upstream content providers
///
/// `Fallback` marks locally configured placeholder content; it has no adapter
/// and never appears in the weight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKey {
    Met,
    Artic,
    Cleveland,
    Fallback,
}

impl SourceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKey::Met => "met",
            SourceKey::Artic => "artic",
            SourceKey::Cleveland => "cleveland",
            SourceKey::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orientation tag derived from an item's dimensions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
    /// Square, unknown, or "no preference" when used as a request hint
    #[default]
    None,
}

impl Orientation {
    /// Derive orientation from width and height in any unit
    pub fn from_dimensions(width: Option<f64>, height: Option<f64>) -> Self {
        match (width, height) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => {
                if w > h {
                    Orientation::Landscape
                } else if h > w {
                    Orientation::Portrait
                } else {
                    Orientation::None
                }
            }
            _ => Orientation::None,
        }
    }

    /// Whether an item with this orientation satisfies a request for `wanted`
    pub fn satisfies(self, wanted: Orientation) -> bool {
        wanted == Orientation::None || self == wanted
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
            Orientation::None => "none",
        }
    }
}

/// Deduplication identity of a content item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemIdentity {
    pub source: SourceKey,
    pub id: String,
}

// ============================================================================
// Content items and pools
// ============================================================================

/// One displayable artwork
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Provider identifier, unique within `source`
    pub id: String,
    pub source: SourceKey,
    pub orientation: Orientation,
    pub title: String,
    pub artist: Option<String>,
    pub date: Option<String>,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    /// Provider page for the object
    pub detail_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ContentItem {
    pub fn identity(&self) -> ItemIdentity {
        ItemIdentity {
            source: self.source,
            id: self.id.clone(),
        }
    }

    /// Placeholder returned when no real item can be produced
    pub fn unavailable(title: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: "unavailable".to_string(),
            source: SourceKey::Fallback,
            orientation: Orientation::None,
            title: title.into(),
            artist: None,
            date: None,
            image_url: image_url.into(),
            thumbnail_url: None,
            detail_url: None,
            width: None,
            height: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.source == SourceKey::Fallback
    }
}

/// Ordered, deduplicated batch of items used as a rotation domain
///
/// Never empty: construction fails for an empty item list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPool {
    items: Vec<ContentItem>,
    built_at: DateTime<Utc>,
}

impl ContentPool {
    /// Build a pool, or `None` if `items` is empty
    pub fn new(items: Vec<ContentItem>, built_at: DateTime<Utc>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self { items, built_at })
        }
    }

    /// Item selected for a rotation slot (`slot mod len`)
    pub fn item_for_slot(&self, slot: i64) -> &ContentItem {
        let index = slot.rem_euclid(self.items.len() as i64) as usize;
        &self.items[index]
    }

    pub fn first(&self) -> &ContentItem {
        &self.items[0]
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

// ============================================================================
// Filters and queries
// ============================================================================

/// Content-style filters applied to a rotation category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFilters {
    #[serde(default)]
    pub styles: Vec<String>,
}

impl ContentFilters {
    pub fn new<I, S>(styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            styles: styles.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated style list, ignoring blanks
    pub fn from_csv(csv: &str) -> Self {
        Self::new(
            csv.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        )
    }

    /// Stable cache-key fragment: sorted lowercase styles, or `all`
    pub fn signature(&self) -> String {
        let mut styles: Vec<String> = self
            .styles
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if styles.is_empty() {
            return "all".to_string();
        }
        styles.sort();
        styles.dedup();
        styles.join(",")
    }
}

/// Parameters handed to a source adapter for one candidate search
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    /// Orientation hint; adapters may ignore it
    pub orientation: Orientation,
    pub styles: Vec<String>,
    /// Upper bound on raw items to return
    pub limit: usize,
}

/// Provider-specific record, normalized by the adapter that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem(pub serde_json::Value);

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single adapter call
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network communication error or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Provider returned a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse provider response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Adapter could not be constructed
    #[error("Client setup error: {0}")]
    Setup(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

/// Errors of the fetcher and rotation layers
#[derive(Debug, Error)]
pub enum ContentError {
    /// Weight table has no enabled source; never retried
    #[error("No content sources enabled")]
    NoSourcesEnabled,

    /// One adapter call failed or produced nothing usable; retried
    #[error("Source {key} failed: {reason}")]
    SourceFailed { key: SourceKey, reason: String },

    /// Retry budget exhausted without an item
    #[error("Content sources unavailable after {attempts} attempts: {last_error}")]
    SourceUnavailable { attempts: u32, last_error: String },

    /// Pool build collected zero items
    #[error("Pool build failed for {category} after {attempts} attempts")]
    PoolBuildFailed { category: String, attempts: u32 },

    #[error("Unknown rotation category: {0}")]
    UnknownCategory(String),
}

// ============================================================================
// Source adapter contract
// ============================================================================

/// Uniform contract implemented by every content provider adapter
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Which provider this adapter talks to
    fn key(&self) -> SourceKey;

    /// Search the provider for raw candidate records
    ///
    /// # Errors
    /// Returns `SourceError` on network, provider or parse failure.
    async fn search_candidates(&self, query: &CandidateQuery) -> Result<Vec<RawItem>, SourceError>;

    /// Convert a raw record into a displayable item, or `None` if unusable
    /// (no image, missing identifier)
    fn normalize(&self, raw: RawItem) -> Option<ContentItem>;
}

/// Shared adapter handle
pub type SharedSource = Arc<dyn ContentSource>;
