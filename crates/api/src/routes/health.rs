use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Health check endpoint, no auth required.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let paused = state.scheduler.is_paused().await;
    let jobs = state.scheduler.statuses().await;
    Json(json!({
        "status": "ok",
        "paused": paused,
        "jobs": jobs,
    }))
}
