//! HTTP client for the upload service: submits files and polls job status
//! until the job finishes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::broadcast::job_progress::JobPhase;
use crate::document::DocumentFormat;
use crate::service::{AcceptedUpload, HealthReport, InlineUpload, JobSnapshot};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not an uploadable file name: {0}")]
    InvalidFileName(String),
}

/// Answer to an upload: a job to poll, or the finished result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Inline(InlineUpload),
    Accepted(AcceptedUpload),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// How often to poll a job.
///
/// Early phases change quickly and are polled at `ingest_interval`; analysis
/// runs longer and is polled at `analysis_interval`. After failed polls the
/// delay doubles per consecutive error, up to `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub ingest_interval: Duration,
    pub analysis_interval: Duration,
    pub max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            ingest_interval: Duration::from_secs(1),
            analysis_interval: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    /// Delay before the next poll. `phase` is the last observed phase, if any.
    pub fn next_delay(&self, phase: Option<JobPhase>, consecutive_errors: u32) -> Duration {
        let base = match phase {
            Some(JobPhase::Analyzing) => self.analysis_interval,
            _ => self.ingest_interval,
        };
        let factor = 2u32.saturating_pow(consecutive_errors.min(16));
        base.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Clone)]
pub struct GraphloadClient {
    http: Client,
    base_url: String,
}

impl GraphloadClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<HealthReport, ClientError> {
        let response = self.http.get(self.url("/health")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Uploads a file from disk. With `sync`, the server processes it inline.
    pub async fn upload_file(
        &self,
        path: &Path,
        federal_state: &str,
        sync: bool,
    ) -> Result<UploadResponse, ClientError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::InvalidFileName(path.display().to_string()))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
        self.upload_bytes(&filename, bytes, federal_state, sync).await
    }

    pub async fn upload_bytes(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        federal_state: &str,
        sync: bool,
    ) -> Result<UploadResponse, ClientError> {
        let media_type = DocumentFormat::from_filename(filename)
            .map_or("application/octet-stream", DocumentFormat::media_type);
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(media_type)?;
        let form = Form::new()
            .part("file", part)
            .text("federalState", federal_state.to_string());

        let mut request = self.http.post(self.url("/upload_file")).multipart(form);
        if sync {
            request = request.query(&[("mode", "sync")]);
        }
        let response = request.send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn status(&self, job_id: &str) -> Result<JobSnapshot, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/upload/status/{}", job_id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::JobNotFound(job_id.to_string()));
        }
        Ok(check(response).await?.json().await?)
    }

    /// Polls a job until it is finished, calling `on_snapshot` for every
    /// snapshot received.
    ///
    /// Transport errors and server errors are retried with backoff for as long
    /// as it takes; only a job the server does not know ends the wait early.
    pub async fn wait_for_completion<F>(
        &self,
        job_id: &str,
        policy: PollPolicy,
        mut on_snapshot: F,
    ) -> Result<JobSnapshot, ClientError>
    where
        F: FnMut(&JobSnapshot),
    {
        let mut last_phase = None;
        let mut consecutive_errors = 0u32;

        loop {
            match self.status(job_id).await {
                Ok(snapshot) => {
                    consecutive_errors = 0;
                    on_snapshot(&snapshot);
                    if snapshot.is_finished() {
                        return Ok(snapshot);
                    }
                    last_phase = Some(snapshot.job.phase);
                }
                Err(ClientError::JobNotFound(id)) => return Err(ClientError::JobNotFound(id)),
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    warn!(
                        "Polling job {} failed ({} in a row): {}",
                        job_id, consecutive_errors, e
                    );
                }
            }

            let delay = policy.next_delay(last_phase, consecutive_errors);
            debug!("Next poll of job {} in {:?}", job_id, delay);
            tokio::time::sleep(delay).await;
        }
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_intervals_by_phase() {
        let policy = PollPolicy::default();
        assert_eq!(policy.next_delay(None, 0), Duration::from_secs(1));
        assert_eq!(
            policy.next_delay(Some(JobPhase::Ingesting), 0),
            Duration::from_secs(1)
        );
        assert_eq!(
            policy.next_delay(Some(JobPhase::Analyzing), 0),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_poll_backoff_is_capped() {
        let policy = PollPolicy::default();
        assert_eq!(
            policy.next_delay(Some(JobPhase::Ingesting), 1),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.next_delay(Some(JobPhase::Analyzing), 2),
            Duration::from_secs(8)
        );
        assert_eq!(
            policy.next_delay(Some(JobPhase::Analyzing), 10),
            Duration::from_secs(30)
        );
        assert_eq!(policy.next_delay(None, u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_upload_response_variants() {
        let accepted: UploadResponse = serde_json::from_str(
            r#"{"success":true,"message":"ok","jobId":"j1","filename":"a.ttl","federalState":"BY"}"#,
        )
        .unwrap();
        assert!(matches!(accepted, UploadResponse::Accepted(ref a) if a.job_id == "j1"));

        let inline: UploadResponse = serde_json::from_str(
            r#"{"success":true,"filename":"a.ttl","federalState":"BY","tabs":[]}"#,
        )
        .unwrap();
        assert!(matches!(inline, UploadResponse::Inline(ref i) if i.tabs.is_empty()));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = GraphloadClient::new("http://localhost:5000/").unwrap();
        assert_eq!(client.url("/health"), "http://localhost:5000/health");
    }
}
