use crate::error::ApiResult;
use crate::state::AppState;
use agentdeck::collaborators::{Destination, FileContent, FileDescriptor, SearchResult};
use agentdeck::models::agent::AgentId;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use http::{header, StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadParams {
    name: String,
    #[serde(default)]
    destination: Destination,
    agent_id: Option<AgentId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    destination: Option<Destination>,
    agent_id: Option<AgentId>,
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    Ok(Json(
        state
            .dashboard
            .search(&request.query, request.limit)
            .await?,
    ))
}

async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<FileDescriptor>)> {
    let file = state
        .dashboard
        .upload_file(&params.name, &body, params.destination, params.agent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(file)))
}

async fn list(State(state): State<AppState>, Query(params): Query<ListParams>) -> Json<Vec<FileDescriptor>> {
    Json(state.dashboard.list_files(params.destination, params.agent_id))
}

async fn download(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let (file, bytes) = state.dashboard.read_file(&id).await?;
    let content_type = file
        .mime_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!("attachment; filename=\"{}\"", file.original_name);
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

async fn content(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<FileContent>> {
    Ok(Json(state.dashboard.file_content(&id).await?))
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.dashboard.delete_file(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(search))
        .route("/api/files", post(upload).get(list))
        .route("/api/files/:id", get(download).delete(remove))
        .route("/api/files/:id/content", get(content))
        .with_state(state)
}
