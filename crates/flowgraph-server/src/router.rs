//! Router assembly for the flowgraph HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with CORS
//! and tracing middleware layers.

use axum::routing::{get, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router.
///
/// Routes use axum 0.8 `/{param}` path syntax.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route(
            "/playgrounds/{playground_id}/sheets",
            get(handlers::sheets::list_sheets).post(handlers::sheets::create_sheet),
        )
        .route(
            "/playgrounds/{playground_id}/sheets/{sheet_id}",
            get(handlers::sheets::get_sheet),
        )
        .route(
            "/playgrounds/{playground_id}/sheets/{sheet_id}/files",
            put(handlers::sheets::replace_files),
        )
        .route(
            "/playgrounds/{playground_id}/sheets/{sheet_id}/runs",
            get(handlers::sheets::list_runs),
        )
        .route("/ws", get(handlers::terminal::terminal))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "flowgraph server is running"
}
