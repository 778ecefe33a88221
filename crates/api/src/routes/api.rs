use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use common::Error;

use crate::AppState;

const DEFAULT_MOVERS: usize = 50;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/watchlist", get(get_watchlist))
        .route("/api/movers", get(get_movers))
        .route("/api/portfolios", get(get_portfolios))
        .route("/api/portfolios/:name", get(get_portfolio))
}

/// Maps domain errors onto HTTP status codes.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::PortfolioNotFound(_) => StatusCode::NOT_FOUND,
            Error::Config(_) | Error::InvalidOrder(_) => StatusCode::BAD_REQUEST,
            e if e.is_provider_failure() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "API request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ─── Watchlist ────────────────────────────────────────────────────────────────

async fn get_watchlist(State(state): State<AppState>) -> Response {
    let symbols = state.watchlist.snapshot().await;
    Json(json!({
        "count": symbols.len(),
        "symbols": symbols,
    }))
    .into_response()
}

// ─── Movers ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct MoversQuery {
    limit: Option<usize>,
}

async fn get_movers(State(state): State<AppState>, Query(q): Query<MoversQuery>) -> Response {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_MOVERS)
        .min(scheduler::MoverLog::DEFAULT_CAPACITY);
    let movers = state.movers.recent(limit).await;
    Json(json!({
        "count": movers.len(),
        "movers": movers,
    }))
    .into_response()
}

// ─── Portfolios ───────────────────────────────────────────────────────────────

async fn get_portfolios(State(state): State<AppState>) -> Result<Response, ApiError> {
    let portfolios = state.trader.ledger().list_portfolios().await?;
    Ok(Json(json!({ "portfolios": portfolios })).into_response())
}

async fn get_portfolio(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let summary = state.trader.summary(&name).await?;
    Ok(Json(summary).into_response())
}
