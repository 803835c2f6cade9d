//! Mode listing and selection

use crate::aggregator::{Mode, ModeStatus, ModeTransition};
use crate::error::ApiResult;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeListResponse {
    pub default_mode: String,
    pub modes: Vec<Mode>,
}

#[derive(Debug, Deserialize)]
pub struct SetModeRequest {
    pub mode: String,
}

/// GET /api/modes
pub async fn list_modes(State(state): State<AppState>) -> Json<ModeListResponse> {
    let registry = state.modes.registry();
    Json(ModeListResponse {
        default_mode: registry.default_mode().name.clone(),
        modes: registry.modes().to_vec(),
    })
}

/// GET /api/mode
pub async fn get_mode(State(state): State<AppState>) -> Json<ModeStatus> {
    Json(state.modes.status().await)
}

/// POST /api/mode
///
/// 400 if the mode is not configured.
pub async fn set_mode(
    State(state): State<AppState>,
    Json(request): Json<SetModeRequest>,
) -> ApiResult<Json<ModeTransition>> {
    let transition = state.modes.set_mode(request.mode.trim()).await?;
    Ok(Json(transition))
}
