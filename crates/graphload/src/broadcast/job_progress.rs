//! Job progress events and their broadcaster.
//!
//! Every state change of an upload job is expressed as a [`JobProgressEvent`].
//! The worker sends events, the job store applies them, and the broadcaster
//! fans them out to live subscribers.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::pipeline::result::ResultTab;

/// Phase of an upload job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Ingesting,
    Analyzing,
    Completed,
    Failed,
}

impl JobPhase {
    /// Overall status implied by the phase.
    pub fn status(self) -> JobStatus {
        match self {
            JobPhase::Completed => JobStatus::Success,
            JobPhase::Failed => JobStatus::Failed,
            JobPhase::Queued | JobPhase::Ingesting | JobPhase::Analyzing => JobStatus::Processing,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Failed)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::Queued => write!(f, "Queued"),
            JobPhase::Ingesting => write!(f, "Uploading batches"),
            JobPhase::Analyzing => write!(f, "Analyzing"),
            JobPhase::Completed => write!(f, "Completed"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Status of a job as reported to clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Success,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A single state transition reported by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum JobUpdate {
    /// The document was parsed; ingest is about to start.
    Started {
        total_triples: usize,
        total_batches: usize,
    },
    /// Batch `batch` (1-based) was accepted by the triple store.
    BatchStored {
        batch: usize,
        processed_triples: usize,
    },
    AnalysisStarted,
    AnalysisStep {
        progress: f64,
        message: String,
    },
    /// Terminal success. The payload is not part of the streamed event;
    /// subscribers fetch it from the status endpoint.
    Completed {
        #[serde(skip)]
        result: Arc<Vec<ResultTab>>,
    },
    /// Terminal failure.
    Failed { error: String },
}

impl JobUpdate {
    /// Phase the job is in once this update is applied.
    pub fn target_phase(&self) -> JobPhase {
        match self {
            JobUpdate::Started { .. } | JobUpdate::BatchStored { .. } => JobPhase::Ingesting,
            JobUpdate::AnalysisStarted | JobUpdate::AnalysisStep { .. } => JobPhase::Analyzing,
            JobUpdate::Completed { .. } => JobPhase::Completed,
            JobUpdate::Failed { .. } => JobPhase::Failed,
        }
    }

    fn describe(&self) -> String {
        match self {
            JobUpdate::Started {
                total_triples,
                total_batches,
            } => format!(
                "Parsed {} triples, uploading in {} batches",
                total_triples, total_batches
            ),
            JobUpdate::BatchStored {
                batch,
                processed_triples,
            } => format!(
                "Stored batch {} ({} triples uploaded)",
                batch, processed_triples
            ),
            JobUpdate::AnalysisStarted => "Analyzing uploaded data".to_string(),
            JobUpdate::AnalysisStep { message, .. } => message.clone(),
            JobUpdate::Completed { .. } => "Upload and analysis completed".to_string(),
            JobUpdate::Failed { error } => format!("Processing failed: {}", error),
        }
    }
}

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    /// Phase after the update.
    pub phase: JobPhase,
    /// Human-readable description of the current activity.
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub update: JobUpdate,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, update: JobUpdate) -> Self {
        Self {
            job_id: job_id.to_string(),
            phase: update.target_phase(),
            message: update.describe(),
            timestamp: Utc::now(),
            update,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.phase.status()
    }
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// Creates a new job progress broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
