use crate::error::ApiResult;
use crate::state::AppState;
use agentdeck::models::agent::AgentId;
use agentdeck::models::room::{RoomDraft, RoomExport, RoomId, RoomMessage, RoomState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use http::{header, StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RoomMessageRequest {
    message: String,
}

async fn list(State(state): State<AppState>) -> Json<Vec<RoomState>> {
    Json(state.dashboard.list_rooms())
}

async fn create(
    State(state): State<AppState>,
    Json(draft): Json<RoomDraft>,
) -> ApiResult<(StatusCode, Json<RoomState>)> {
    let room = state.dashboard.create_room(draft)?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn show(State(state): State<AppState>, Path(id): Path<RoomId>) -> ApiResult<Json<RoomState>> {
    Ok(Json(state.dashboard.get_room(id)?))
}

async fn remove(State(state): State<AppState>, Path(id): Path<RoomId>) -> ApiResult<Json<RoomState>> {
    Ok(Json(state.dashboard.delete_room(id)?))
}

async fn add_member(
    State(state): State<AppState>,
    Path((id, agent_id)): Path<(RoomId, AgentId)>,
) -> ApiResult<Json<RoomState>> {
    Ok(Json(state.dashboard.add_agent_to_room(id, agent_id)?))
}

async fn remove_member(
    State(state): State<AppState>,
    Path((id, agent_id)): Path<(RoomId, AgentId)>,
) -> ApiResult<Json<RoomState>> {
    Ok(Json(state.dashboard.remove_agent_from_room(id, agent_id)?))
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
    Json(request): Json<RoomMessageRequest>,
) -> ApiResult<Json<Vec<RoomMessage>>> {
    Ok(Json(
        state
            .dashboard
            .send_room_message(id, &request.message)
            .await?,
    ))
}

// Served as a download so the browser saves it under the export's file name.
async fn export(State(state): State<AppState>, Path(id): Path<RoomId>) -> ApiResult<impl IntoResponse> {
    let export: RoomExport = state.dashboard.export_room(id)?;
    let disposition = format!("attachment; filename=\"{}\"", export.file_name);
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(export)))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/rooms", get(list).post(create))
        .route("/api/rooms/:id", get(show).delete(remove))
        .route("/api/rooms/:id/agents/:agent_id", post(add_member).delete(remove_member))
        .route("/api/rooms/:id/messages", post(send_message))
        .route("/api/rooms/:id/export", get(export))
        .with_state(state)
}
