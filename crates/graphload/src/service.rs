//! Upload service: validates submissions, owns the job store and the worker
//! pool, and answers status queries.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::broadcast::job_progress::{
    JobPhase, JobProgressBroadcaster, JobProgressEvent, JobStatus, JobUpdate,
};
use crate::broadcast::job_store::{JobCounts, JobStore, UploadJob};
use crate::document::DocumentFormat;
use crate::error::{JobStoreError, WorkerError};
use crate::pipeline::result::{skipped_analysis_tabs, ResultTab};
use crate::pipeline::{Pipeline, PipelineError};
use crate::sanitize::redact_filename;
use crate::worker::{Job, WorkerPool};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {0} is not in processing state")]
    JobNotProcessing(String),

    #[error("Upload queue is full")]
    QueueFull,

    #[error("File too large: {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("{0}")]
    Processing(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A file submitted for a tenant.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub federal_state: String,
    pub bytes: Vec<u8>,
}

/// Answer to an accepted asynchronous upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub job_id: String,
    pub filename: String,
    pub federal_state: String,
}

/// Response of an accepted asynchronous upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedUpload {
    pub success: bool,
    pub message: String,
    pub job_id: String,
    pub filename: String,
    pub federal_state: String,
}

impl From<SubmitReceipt> for AcceptedUpload {
    fn from(receipt: SubmitReceipt) -> Self {
        Self {
            success: true,
            message: "File uploaded, processing started".to_string(),
            job_id: receipt.job_id,
            filename: receipt.filename,
            federal_state: receipt.federal_state,
        }
    }
}

/// Response of a synchronous upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineUpload {
    pub success: bool,
    pub filename: String,
    pub federal_state: String,
    pub tabs: Arc<Vec<ResultTab>>,
}

/// Liveness answer with per-status job counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub jobs: JobCounts,
}

/// A job record plus the progress of whatever phase it is in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub job: UploadJob,
    /// Ingest progress while queued or ingesting, analysis progress while
    /// analyzing, 100 once finished.
    pub active_phase_progress: f64,
}

impl JobSnapshot {
    pub fn from_job(job: UploadJob) -> Self {
        let active_phase_progress = match job.phase {
            JobPhase::Queued | JobPhase::Ingesting => job.progress,
            JobPhase::Analyzing => job.analysis_progress.as_ref().map_or(0.0, |a| a.progress),
            JobPhase::Completed | JobPhase::Failed => 100.0,
        };
        Self {
            job,
            active_phase_progress,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.job.is_finished()
    }
}

/// Analysis-centric view of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgressView {
    pub job_id: String,
    /// Whether every batch has been stored.
    pub upload_complete: bool,
    pub analysis_progress: f64,
    pub analysis_status: String,
    pub overall_status: JobStatus,
    pub updated_at: DateTime<Utc>,
}

fn tenant_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("tenant pattern is a valid regex")
    })
}

pub struct UploadService {
    job_store: Arc<dyn JobStore>,
    broadcaster: JobProgressBroadcaster,
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
    max_upload_bytes: usize,
}

impl UploadService {
    /// Starts the worker pool and returns the service owning it.
    pub fn start(
        pipeline: Arc<Pipeline>,
        job_store: Arc<dyn JobStore>,
        broadcaster: JobProgressBroadcaster,
        worker_count: usize,
        queue_capacity: usize,
        max_upload_bytes: usize,
    ) -> Self {
        let pool = WorkerPool::new(
            Arc::clone(&pipeline),
            Arc::clone(&job_store),
            broadcaster.clone(),
            worker_count,
            queue_capacity,
        );
        Self {
            job_store,
            broadcaster,
            pipeline,
            pool,
            max_upload_bytes,
        }
    }

    /// Checks a request and returns the detected document format.
    pub fn validate(&self, request: &UploadRequest) -> Result<DocumentFormat, ServiceError> {
        if request.filename.trim().is_empty() {
            return Err(ServiceError::Validation("No file selected".to_string()));
        }
        let format = DocumentFormat::from_filename(&request.filename).ok_or_else(|| {
            ServiceError::Validation(
                "Invalid file type. Please upload a .ttl or .nt file".to_string(),
            )
        })?;

        if request.federal_state.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Federal state is required".to_string(),
            ));
        }
        if !tenant_pattern().is_match(&request.federal_state) {
            return Err(ServiceError::Validation(format!(
                "Invalid federal state '{}': use 1-64 letters, digits, '-' or '_'",
                request.federal_state
            )));
        }

        if request.bytes.is_empty() {
            return Err(ServiceError::Validation("Uploaded file is empty".to_string()));
        }
        if request.bytes.len() > self.max_upload_bytes {
            return Err(ServiceError::TooLarge {
                size: request.bytes.len(),
                limit: self.max_upload_bytes,
            });
        }

        Ok(format)
    }

    /// Accepts an upload for background processing.
    pub fn submit(&self, request: UploadRequest) -> Result<SubmitReceipt, ServiceError> {
        let format = self.validate(&request)?;
        let filename = redact_filename(&request.filename);

        let record = self.job_store.create(&filename, &request.federal_state);
        let job = Job::new(
            &record.job_id,
            &filename,
            &request.federal_state,
            format,
            request.bytes,
        );

        match self.pool.try_submit(job) {
            Ok(()) => {
                info!(
                    "Queued job {} for {} ({})",
                    record.job_id, request.federal_state, filename
                );
                Ok(SubmitReceipt {
                    job_id: record.job_id,
                    filename,
                    federal_state: request.federal_state,
                })
            }
            Err(e) => {
                let error = match e {
                    WorkerError::QueueFull => ServiceError::QueueFull,
                    other => ServiceError::Internal(other.to_string()),
                };
                self.fail_record(&record.job_id, &error.to_string());
                Err(error)
            }
        }
    }

    fn fail_record(&self, job_id: &str, error: &str) {
        let event = JobProgressEvent::new(
            job_id,
            JobUpdate::Failed {
                error: error.to_string(),
            },
        );
        match self.job_store.apply(&event) {
            Ok(_) => self.broadcaster.send(event),
            Err(e) => warn!("Could not mark job {} as failed: {}", job_id, e),
        }
    }

    /// Processes an upload on the calling thread and returns the result tabs.
    /// No job record is created.
    pub fn process_inline(
        &self,
        request: UploadRequest,
    ) -> Result<Arc<Vec<ResultTab>>, ServiceError> {
        let format = self.validate(&request)?;
        let job = Job::detached(
            &redact_filename(&request.filename),
            &request.federal_state,
            format,
            request.bytes,
        );
        Ok(self.pipeline.run_inline(&job)?)
    }

    pub fn status(&self, job_id: &str) -> Result<JobSnapshot, ServiceError> {
        self.job_store
            .get(job_id)
            .map(JobSnapshot::from_job)
            .ok_or_else(|| ServiceError::JobNotFound(job_id.to_string()))
    }

    pub fn analysis_progress(&self, job_id: &str) -> Result<AnalysisProgressView, ServiceError> {
        let job = self
            .job_store
            .get(job_id)
            .ok_or_else(|| ServiceError::JobNotFound(job_id.to_string()))?;

        let upload_complete = matches!(job.phase, JobPhase::Analyzing | JobPhase::Completed)
            || (job.phase == JobPhase::Ingesting && job.processed_triples == job.total_triples);
        let (analysis_progress, analysis_status) = match (&job.analysis_progress, job.phase) {
            (Some(a), _) => (a.progress, a.status.clone()),
            (None, JobPhase::Completed) => (100.0, job.message.clone()),
            (None, _) => (0.0, "Waiting for upload to finish".to_string()),
        };

        Ok(AnalysisProgressView {
            job_id: job.job_id,
            upload_complete,
            analysis_progress,
            analysis_status,
            overall_status: job.status,
            updated_at: job.updated_at,
        })
    }

    /// All job records, newest first.
    pub fn list_jobs(&self) -> Vec<UploadJob> {
        self.job_store.list()
    }

    /// Marks a processing job as successful with a minimal summary.
    ///
    /// A worker still running the job has its later updates rejected.
    pub fn force_complete(&self, job_id: &str) -> Result<JobSnapshot, ServiceError> {
        let job = self
            .job_store
            .get(job_id)
            .ok_or_else(|| ServiceError::JobNotFound(job_id.to_string()))?;
        if job.is_finished() {
            return Err(ServiceError::JobNotProcessing(job_id.to_string()));
        }

        let graph = self.pipeline.graph_for(&job.federal_state);
        let result = skipped_analysis_tabs(
            &job.federal_state,
            &graph,
            job.total_triples,
            &self.pipeline.store().sparql_endpoint(),
        );
        let event = JobProgressEvent::new(
            job_id,
            JobUpdate::Completed {
                result: Arc::new(result),
            },
        );

        match self.job_store.apply(&event) {
            Ok(job) => {
                info!("Job {} completed by hand", job_id);
                self.broadcaster.send(event);
                Ok(JobSnapshot::from_job(job))
            }
            Err(JobStoreError::AlreadyFinished(_)) => {
                Err(ServiceError::JobNotProcessing(job_id.to_string()))
            }
            Err(JobStoreError::NotFound(_)) => Err(ServiceError::JobNotFound(job_id.to_string())),
            Err(e) => Err(ServiceError::Internal(e.to_string())),
        }
    }

    pub fn counts(&self) -> JobCounts {
        self.job_store.counts()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            jobs: self.counts(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Stops accepting jobs and waits for the workers to exit.
    pub fn shutdown(self) {
        self.pool.shutdown();
        self.pool.wait();
    }
}
