//! Composite dashboard snapshots
//!
//! Always 200: unknown modes resolve to the default and failing categories
//! are reported inside the body.

use crate::aggregator::CompositeResult;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub mode: Option<String>,
}

/// GET /api/dashboard?mode=
///
/// Without `mode`, the current mode is used.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Json<CompositeResult> {
    let result = match query.mode.as_deref() {
        Some(mode) => state.aggregator.aggregate(Some(mode)).await,
        None => state.aggregator.aggregate_current().await,
    };
    Json(result)
}

/// GET /api/dashboard/:mode
pub async fn get_dashboard_for_mode(
    State(state): State<AppState>,
    Path(mode): Path<String>,
) -> Json<CompositeResult> {
    Json(state.aggregator.aggregate(Some(&mode)).await)
}
