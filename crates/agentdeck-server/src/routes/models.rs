use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use agentdeck::dashboard::GenerateRequest;
use agentdeck::models::model::{BackendKind, ModelDescriptor};
use agentdeck::registry::BackendStatus;
use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct ActiveRequest {
    backend: BackendKind,
    name: String,
    active: bool,
}

/// Names travel in the body: namespaced ones like `user/model:tag` would
/// not fit a single path segment.
#[derive(Debug, Deserialize)]
struct OllamaModelRequest {
    name: String,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    response: String,
}

async fn list(State(state): State<AppState>) -> Json<Vec<ModelDescriptor>> {
    Json(state.dashboard.models())
}

async fn refresh(State(state): State<AppState>) -> Json<Vec<ModelDescriptor>> {
    Json(state.dashboard.refresh_models().await)
}

async fn status(State(state): State<AppState>) -> Json<Vec<BackendStatus>> {
    Json(state.dashboard.service_status())
}

async fn set_active(
    State(state): State<AppState>,
    Json(request): Json<ActiveRequest>,
) -> ApiResult<Json<ModelDescriptor>> {
    let model = state
        .dashboard
        .set_model_active(request.backend, &request.name, request.active)?;
    Ok(Json(model))
}

async fn pull(
    State(state): State<AppState>,
    Json(request): Json<OllamaModelRequest>,
) -> ApiResult<Json<Vec<ModelDescriptor>>> {
    Ok(Json(state.dashboard.pull_model(&request.name).await?))
}

async fn remove(
    State(state): State<AppState>,
    Json(request): Json<OllamaModelRequest>,
) -> ApiResult<Json<Vec<ModelDescriptor>>> {
    Ok(Json(state.dashboard.delete_model(&request.name).await?))
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    if request.model_route.trim().is_empty() {
        return Err(ApiError::bad_request("modelRoute is required"));
    }
    let response = state.dashboard.generate(request).await?;
    Ok(Json(GenerateResponse { response }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/models", get(list))
        .route("/api/models/refresh", post(refresh))
        .route("/api/models/status", get(status))
        .route("/api/models/active", post(set_active))
        .route("/api/models/ollama", delete(remove))
        .route("/api/models/ollama/pull", post(pull))
        .route("/api/generate", post(generate))
        .with_state(state)
}
