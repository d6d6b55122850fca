use crate::error::ApiResult;
use crate::state::AppState;
use agentdeck::dashboard::ChatReply;
use agentdeck::models::agent::{AgentConfig, AgentDraft, AgentId, ConversationRecord};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LearningResponse {
    learning_enabled: bool,
}

async fn list(State(state): State<AppState>) -> Json<Vec<AgentConfig>> {
    Json(state.dashboard.list_agents())
}

async fn create(
    State(state): State<AppState>,
    Json(draft): Json<AgentDraft>,
) -> ApiResult<(StatusCode, Json<AgentConfig>)> {
    let agent = state.dashboard.create_agent(draft).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn show(State(state): State<AppState>, Path(id): Path<AgentId>) -> ApiResult<Json<AgentConfig>> {
    Ok(Json(state.dashboard.get_agent(id)?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
    Json(draft): Json<AgentDraft>,
) -> ApiResult<Json<AgentConfig>> {
    Ok(Json(state.dashboard.update_agent(id, draft).await?))
}

async fn remove(State(state): State<AppState>, Path(id): Path<AgentId>) -> ApiResult<Json<AgentConfig>> {
    Ok(Json(state.dashboard.delete_agent(id)?))
}

async fn activate(State(state): State<AppState>, Path(id): Path<AgentId>) -> ApiResult<Json<AgentConfig>> {
    Ok(Json(state.dashboard.activate_agent(id).await?))
}

async fn deactivate(State(state): State<AppState>, Path(id): Path<AgentId>) -> ApiResult<Json<AgentConfig>> {
    Ok(Json(state.dashboard.deactivate_agent(id)?))
}

async fn learning(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> ApiResult<Json<LearningResponse>> {
    let learning_enabled = state.dashboard.toggle_learning(id)?;
    Ok(Json(LearningResponse { learning_enabled }))
}

async fn chat(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    Ok(Json(state.dashboard.chat(id, &request.message).await?))
}

async fn conversations(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> ApiResult<Json<Vec<ConversationRecord>>> {
    Ok(Json(state.dashboard.conversations(id)?))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/agents", get(list).post(create))
        .route("/api/agents/:id", get(show).put(update).delete(remove))
        .route("/api/agents/:id/activate", post(activate))
        .route("/api/agents/:id/deactivate", post(deactivate))
        .route("/api/agents/:id/learning", post(learning))
        .route("/api/agents/:id/chat", post(chat))
        .route("/api/agents/:id/conversations", get(conversations))
        .with_state(state)
}
