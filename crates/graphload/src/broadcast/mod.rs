//! Job records and progress events.
//!
//! The pipeline reports progress as events; the job store applies them and the
//! broadcaster streams them to live subscribers.

pub mod job_progress;
pub mod job_store;

pub use job_progress::{JobPhase, JobProgressBroadcaster, JobProgressEvent, JobStatus, JobUpdate};
pub use job_store::{
    AnalysisProgress, JobCounts, JobMutator, JobStore, MemoryJobStore, RetentionPolicy, UploadJob,
};
