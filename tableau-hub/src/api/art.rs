//! Artwork rotation endpoints

use crate::content::{ContentFilters, ContentItem};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct StylesQuery {
    /// Comma-separated style filters
    pub styles: Option<String>,
}

impl StylesQuery {
    fn filters(&self) -> ContentFilters {
        self.styles
            .as_deref()
            .map(ContentFilters::from_csv)
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub category: String,
    pub filter_signature: String,
    pub items: usize,
}

/// GET /api/art?styles=
pub async fn get_all_art(
    State(state): State<AppState>,
    Query(query): Query<StylesQuery>,
) -> Json<BTreeMap<String, ContentItem>> {
    Json(state.rotation.get_all(&query.filters()).await)
}

/// GET /api/art/:category?styles=
pub async fn get_art(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<StylesQuery>,
) -> ApiResult<Json<ContentItem>> {
    if state.rotation.category(&category).is_none() {
        return Err(ApiError::NotFound(format!("Rotation category '{}'", category)));
    }
    Ok(Json(state.rotation.get_current(&category, &query.filters()).await))
}

/// POST /api/art/:category/refresh?styles=
pub async fn refresh_art(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<StylesQuery>,
) -> ApiResult<Json<RefreshResponse>> {
    let filters = query.filters();
    let items = state.rotation.refresh_pool(&category, &filters).await?;
    info!(category = %category, items, "Pool refreshed on request");

    Ok(Json(RefreshResponse {
        category,
        filter_signature: filters.signature(),
        items,
    }))
}
