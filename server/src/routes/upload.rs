//! `POST /upload_file`: multipart upload of a Turtle or N-Triples file.
//!
//! By default the file is queued and the response carries the job id to poll.
//! With `?mode=sync` the file is processed before responding and the result
//! tabs are returned directly.

use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use graphload::service::{AcceptedUpload, InlineUpload, UploadRequest};
use serde::Deserialize;

use crate::error::{Result, ServerError};
use crate::state::AppState;

const FILE_FIELD: &str = "file";
const TENANT_FIELD: &str = "federalState";

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub mode: Option<String>,
}

impl UploadQuery {
    fn is_sync(&self) -> bool {
        self.mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("sync"))
    }
}

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Response> {
    let request = read_form(multipart).await?;
    tracing::info!(
        filename = %graphload::sanitize::redact_filename(&request.filename),
        federal_state = %request.federal_state,
        bytes = request.bytes.len(),
        sync = query.is_sync(),
        "upload received"
    );

    if query.is_sync() {
        let filename = request.filename.clone();
        let federal_state = request.federal_state.clone();
        let worker_state = Arc::clone(&state);
        let tabs = tokio::task::spawn_blocking(move || worker_state.service.process_inline(request))
            .await
            .map_err(|e| ServerError::internal(format!("processing task failed: {}", e)))??;

        return Ok(Json(InlineUpload {
            success: true,
            filename: graphload::sanitize::redact_filename(&filename),
            federal_state,
            tabs,
        })
        .into_response());
    }

    let receipt = state.service.submit(request)?;
    Ok(Json(AcceptedUpload::from(receipt)).into_response())
}

async fn read_form(mut multipart: Multipart) -> Result<UploadRequest> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut federal_state = String::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some((filename, bytes.to_vec()));
            }
            TENANT_FIELD => {
                federal_state = field.text().await?.trim().to_string();
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown form field");
            }
        }
    }

    let (filename, bytes) = file.ok_or_else(|| ServerError::bad_request("No file part"))?;
    Ok(UploadRequest {
        filename,
        federal_state,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_mode_detection() {
        let query = |mode: Option<&str>| UploadQuery {
            mode: mode.map(str::to_string),
        };
        assert!(query(Some("sync")).is_sync());
        assert!(query(Some("SYNC")).is_sync());
        assert!(!query(Some("async")).is_sync());
        assert!(!query(None).is_sync());
    }
}
