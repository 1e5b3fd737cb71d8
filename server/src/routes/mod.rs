//! HTTP route handlers and router configuration

mod events;
mod health;
mod jobs;
mod upload;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Multipart framing on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state
        .config
        .server
        .max_upload_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/upload_file", post(upload::upload_file))
        .route("/upload/status/{job_id}", get(jobs::status))
        .route(
            "/upload/analysis_progress/{job_id}",
            get(jobs::analysis_progress),
        )
        .route("/upload/jobs", get(jobs::list))
        .route("/upload/complete/{job_id}", post(jobs::force_complete))
        .route("/upload/events", get(events::events))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}
