use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use graphload::service::HealthReport;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.service.health())
}
