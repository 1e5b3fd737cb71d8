//! Job status endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use graphload::broadcast::UploadJob;
use graphload::service::{AnalysisProgressView, JobSnapshot};

use crate::error::Result;
use crate::state::AppState;

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>> {
    Ok(Json(state.service.status(&job_id)?))
}

pub async fn analysis_progress(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<AnalysisProgressView>> {
    Ok(Json(state.service.analysis_progress(&job_id)?))
}

/// All retained jobs, newest first.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<UploadJob>> {
    Json(state.service.list_jobs())
}

pub async fn force_complete(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>> {
    tracing::info!(job_id = %job_id, "force completion requested");
    Ok(Json(state.service.force_complete(&job_id)?))
}
