//! Cache statistics

use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;
use tableau_common::CacheStats;

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub rotation: CacheStats,
    pub feeds: BTreeMap<&'static str, CacheStats>,
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        rotation: state.rotation.cache_stats(),
        feeds: state.aggregator.feeds().cache_stats(),
    })
}
