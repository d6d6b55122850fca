use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct SetCredentialRequest {
    value: String,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    cleared: bool,
}

async fn status(State(state): State<AppState>) -> Json<BTreeMap<String, bool>> {
    Json(state.dashboard.credential_status())
}

async fn set(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<SetCredentialRequest>,
) -> ApiResult<StatusCode> {
    state.dashboard.set_credential(&name, &request.value)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<ClearResponse>> {
    let cleared = state.dashboard.clear_credential(&name)?;
    Ok(Json(ClearResponse { cleared }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/credentials", get(status))
        .route("/api/credentials/:name", put(set).delete(clear))
        .with_state(state)
}
