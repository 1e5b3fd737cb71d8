use std::sync::Arc;

use crate::broadcast::job_progress::{JobProgressBroadcaster, JobProgressEvent, JobUpdate};
use crate::broadcast::job_store::JobStore;
use crate::error::JobStoreError;

/// Receives the pipeline's state transitions.
///
/// An error means the job record refused the update; the pipeline stops
/// without reporting anything further.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: JobUpdate) -> Result<(), JobStoreError>;
}

/// No-op reporter for synchronous runs and unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _update: JobUpdate) -> Result<(), JobStoreError> {
        Ok(())
    }
}

/// Applies updates to the job record, then streams the accepted event.
pub struct StoreProgress {
    job_id: String,
    store: Arc<dyn JobStore>,
    broadcaster: JobProgressBroadcaster,
}

impl StoreProgress {
    pub fn new(job_id: &str, store: Arc<dyn JobStore>, broadcaster: JobProgressBroadcaster) -> Self {
        Self {
            job_id: job_id.to_string(),
            store,
            broadcaster,
        }
    }
}

impl ProgressReporter for StoreProgress {
    fn report(&self, update: JobUpdate) -> Result<(), JobStoreError> {
        let event = JobProgressEvent::new(&self.job_id, update);
        self.store.apply(&event)?;
        self.broadcaster.send(event);
        Ok(())
    }
}
