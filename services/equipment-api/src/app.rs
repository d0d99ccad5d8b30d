use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes_datasets::{get_history, get_summary, health_check, upload_csv};
use crate::routes_report::get_report;
use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/api/upload/", post(upload_csv))
        .route("/api/summary/:id/", get(get_summary))
        .route("/api/history/", get(get_history))
        .route("/api/report/:id/", get(get_report))
        .route("/api/health/", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
