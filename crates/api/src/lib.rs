mod auth;
pub mod routes;

use std::net::SocketAddr;

use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{Result, Watchlist};
use paper::PaperTrader;
use scheduler::{MoverLog, SchedulerHandle};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub watchlist: Watchlist,
    pub scheduler: SchedulerHandle,
    pub movers: MoverLog,
    pub trader: PaperTrader,
    pub dashboard_token: String,
}

/// The full route tree with auth and CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let protected = routes::api_router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_auth,
    ));

    Router::new()
        .merge(protected)
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    info!(%addr, "Status API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
