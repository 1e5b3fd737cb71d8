use std::fmt;
use std::sync::Arc;

use crate::document::DocumentFormat;
use crate::pipeline::result::ResultTab;

/// An upload waiting for (or undergoing) processing.
#[derive(Clone)]
pub struct Job {
    pub id: String,
    pub filename: String,
    /// Tenant tag selecting the target graph.
    pub federal_state: String,
    pub format: DocumentFormat,
    pub document: Arc<[u8]>,
}

impl Job {
    /// Creates a job bound to an existing job record.
    pub fn new(
        id: &str,
        filename: &str,
        federal_state: &str,
        format: DocumentFormat,
        document: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            id: id.to_string(),
            filename: filename.to_string(),
            federal_state: federal_state.to_string(),
            format,
            document: document.into(),
        }
    }

    /// Creates a job that has no job record, for synchronous processing.
    pub fn detached(
        filename: &str,
        federal_state: &str,
        format: DocumentFormat,
        document: impl Into<Arc<[u8]>>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self::new(&id, filename, federal_state, format, document)
    }
}

// The document can be hundreds of megabytes; only its size is printed.
impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("federal_state", &self.federal_state)
            .field("format", &self.format)
            .field("document_bytes", &self.document.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub federal_state: String,
    pub success: bool,
    pub triples: usize,
    pub result: Option<Arc<Vec<ResultTab>>>,
    pub error: Option<String>,
}

impl JobResult {
    pub fn success(job: &Job, triples: usize, result: Arc<Vec<ResultTab>>) -> Self {
        Self {
            job_id: job.id.clone(),
            federal_state: job.federal_state.clone(),
            success: true,
            triples,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(job: &Job, error: String) -> Self {
        Self {
            job_id: job.id.clone(),
            federal_state: job.federal_state.clone(),
            success: false,
            triples: 0,
            result: None,
            error: Some(error),
        }
    }
}
