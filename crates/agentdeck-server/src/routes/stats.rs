use crate::state::AppState;
use agentdeck::dashboard::DashboardStats;
use axum::{extract::State, routing::get, Json, Router};

async fn stats(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(state.dashboard.stats())
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/stats", get(stats))
        .with_state(state)
}
