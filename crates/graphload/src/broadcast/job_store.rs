//! Job store holding one record per accepted upload.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::broadcast::job_progress::{JobPhase, JobProgressEvent, JobStatus, JobUpdate};
use crate::error::JobStoreError;
use crate::pipeline::result::ResultTab;

// ─── UploadJob ──────────────────────────────────────────────────────────────

/// Progress of the analysis phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgress {
    pub status: String,
    /// Percent in `[0, 100]`.
    pub progress: f64,
}

/// The record of one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadJob {
    pub job_id: String,
    pub filename: String,
    pub federal_state: String,
    pub status: JobStatus,
    pub phase: JobPhase,
    /// Ingest progress in percent.
    pub progress: f64,
    pub total_triples: usize,
    pub processed_triples: usize,
    pub current_batch: usize,
    pub total_batches: usize,
    pub analysis_progress: Option<AnalysisProgress>,
    pub error_message: Option<String>,
    pub result_data: Option<Arc<Vec<ResultTab>>>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadJob {
    pub fn new(filename: &str, federal_state: &str) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            federal_state: federal_state.to_string(),
            status: JobStatus::Processing,
            phase: JobPhase::Queued,
            progress: 0.0,
            total_triples: 0,
            processed_triples: 0,
            current_batch: 0,
            total_batches: 0,
            analysis_progress: None,
            error_message: None,
            result_data: None,
            message: "Job queued for processing".to_string(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Applies one progress event, enforcing the phase state machine.
    ///
    /// On error the record may be partially modified; callers apply events to
    /// a copy (see [`JobStore::update`]).
    pub fn apply(&mut self, event: &JobProgressEvent) -> Result<(), JobStoreError> {
        if self.is_finished() {
            return Err(JobStoreError::AlreadyFinished(self.job_id.clone()));
        }

        match &event.update {
            JobUpdate::Started {
                total_triples,
                total_batches,
            } => {
                self.expect_phase(JobPhase::Queued, "ingest already started")?;
                if (*total_triples == 0) != (*total_batches == 0) {
                    return Err(self.invalid(format!(
                        "{} triples cannot fill {} batches",
                        total_triples, total_batches
                    )));
                }
                self.total_triples = *total_triples;
                self.total_batches = *total_batches;
                self.processed_triples = 0;
                self.current_batch = 0;
                self.progress = if *total_triples == 0 { 100.0 } else { 0.0 };
            }
            JobUpdate::BatchStored {
                batch,
                processed_triples,
            } => {
                self.expect_phase(JobPhase::Ingesting, "batch reported outside ingest")?;
                if *batch <= self.current_batch || *batch > self.total_batches {
                    return Err(self.invalid(format!(
                        "batch {} out of order (current {}, total {})",
                        batch, self.current_batch, self.total_batches
                    )));
                }
                if *processed_triples < self.processed_triples
                    || *processed_triples > self.total_triples
                {
                    return Err(self.invalid(format!(
                        "processed triples {} outside {}..={}",
                        processed_triples, self.processed_triples, self.total_triples
                    )));
                }
                self.current_batch = *batch;
                self.processed_triples = *processed_triples;
                self.progress = percent(self.processed_triples, self.total_triples);
            }
            JobUpdate::AnalysisStarted => {
                self.expect_phase(JobPhase::Ingesting, "analysis requires a finished ingest")?;
                if self.processed_triples != self.total_triples {
                    return Err(self.invalid(format!(
                        "analysis started after {} of {} triples",
                        self.processed_triples, self.total_triples
                    )));
                }
                self.analysis_progress = Some(AnalysisProgress {
                    status: event.message.clone(),
                    progress: 0.0,
                });
            }
            JobUpdate::AnalysisStep { progress, message } => {
                self.expect_phase(JobPhase::Analyzing, "analysis step before analysis")?;
                let current = self.analysis_progress.as_ref().map_or(0.0, |a| a.progress);
                if !(0.0..=100.0).contains(progress) || *progress < current {
                    return Err(self.invalid(format!(
                        "analysis progress {} after {}",
                        progress, current
                    )));
                }
                self.analysis_progress = Some(AnalysisProgress {
                    status: message.clone(),
                    progress: *progress,
                });
            }
            JobUpdate::Completed { result } => {
                self.result_data = Some(Arc::clone(result));
                self.error_message = None;
                self.completed_at = Some(event.timestamp);
            }
            JobUpdate::Failed { error } => {
                self.error_message = Some(error.clone());
                self.result_data = None;
                self.completed_at = Some(event.timestamp);
            }
        }

        self.phase = event.phase;
        self.status = event.phase.status();
        self.message = event.message.clone();
        self.updated_at = event.timestamp;
        Ok(())
    }

    fn expect_phase(&self, expected: JobPhase, reason: &str) -> Result<(), JobStoreError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(self.invalid(format!("{} (phase is {:?})", reason, self.phase)))
        }
    }

    fn invalid(&self, reason: String) -> JobStoreError {
        JobStoreError::InvalidTransition {
            job_id: self.job_id.clone(),
            reason,
        }
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Checks that `after` is a legal successor of `before`.
fn check_transition(before: &UploadJob, after: &UploadJob) -> Result<(), JobStoreError> {
    let invalid = |reason: &str| JobStoreError::InvalidTransition {
        job_id: before.job_id.clone(),
        reason: reason.to_string(),
    };

    if before.is_finished() {
        return Err(JobStoreError::AlreadyFinished(before.job_id.clone()));
    }
    if after.job_id != before.job_id
        || after.filename != before.filename
        || after.federal_state != before.federal_state
        || after.created_at != before.created_at
    {
        return Err(invalid("identity fields are immutable"));
    }
    if after.status != after.phase.status() {
        return Err(invalid("status does not match phase"));
    }
    if after.processed_triples < before.processed_triples
        || after.current_batch < before.current_batch
    {
        return Err(invalid("ingest counters went backwards"));
    }
    if after.processed_triples > after.total_triples || after.current_batch > after.total_batches {
        return Err(invalid("ingest counters exceed totals"));
    }
    match after.status {
        JobStatus::Processing if after.result_data.is_some() || after.error_message.is_some() => {
            Err(invalid("processing job carries a result or error"))
        }
        JobStatus::Success if after.result_data.is_none() || after.error_message.is_some() => {
            Err(invalid("successful job needs a result and no error"))
        }
        JobStatus::Failed if after.error_message.is_none() || after.result_data.is_some() => {
            Err(invalid("failed job needs an error and no result"))
        }
        _ => Ok(()),
    }
}

// ─── Store ──────────────────────────────────────────────────────────────────

/// Number of jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub processing: usize,
    pub success: usize,
    pub failed: usize,
}

/// Mutator passed to [`JobStore::update`].
pub type JobMutator<'a> = dyn FnMut(&mut UploadJob) -> Result<(), JobStoreError> + 'a;

pub trait JobStore: Send + Sync {
    /// Creates a processing record in the queued phase.
    fn create(&self, filename: &str, federal_state: &str) -> UploadJob;

    fn get(&self, job_id: &str) -> Option<UploadJob>;

    /// Runs `mutator` on a copy of the record and commits the copy if both the
    /// mutator and the transition checks succeed. Returns the committed record.
    fn update(&self, job_id: &str, mutator: &mut JobMutator<'_>) -> Result<UploadJob, JobStoreError>;

    fn apply(&self, event: &JobProgressEvent) -> Result<UploadJob, JobStoreError> {
        self.update(&event.job_id, &mut |job| job.apply(event))
    }

    /// All records, newest first.
    fn list(&self) -> Vec<UploadJob>;

    fn counts(&self) -> JobCounts;

    /// Drops finished records that fall outside the retention policy.
    /// Returns the number of records removed.
    fn evict_expired(&self, now: DateTime<Utc>) -> usize;
}

/// Limits on how many finished jobs are kept, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_finished_jobs: usize,
    pub max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_finished_jobs: 1000,
            max_age: Duration::hours(24),
        }
    }
}

/// In-memory job store.
///
/// Uses `std::sync::RwLock`; every operation is a short map access, so
/// holding the lock from async handlers is fine.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, UploadJob>>,
    retention: RetentionPolicy,
}

impl MemoryJobStore {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention,
        }
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<String, UploadJob>> {
        match self.jobs.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<String, UploadJob>> {
        match self.jobs.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, filename: &str, federal_state: &str) -> UploadJob {
        let evicted = self.evict_expired(Utc::now());
        if evicted > 0 {
            log::debug!("Evicted {} finished jobs", evicted);
        }

        let job = UploadJob::new(filename, federal_state);
        self.write_jobs().insert(job.job_id.clone(), job.clone());
        job
    }

    fn get(&self, job_id: &str) -> Option<UploadJob> {
        self.read_jobs().get(job_id).cloned()
    }

    fn update(&self, job_id: &str, mutator: &mut JobMutator<'_>) -> Result<UploadJob, JobStoreError> {
        let mut jobs = self.write_jobs();
        let current = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobStoreError::NotFound(job_id.to_string()))?;

        if current.is_finished() {
            return Err(JobStoreError::AlreadyFinished(job_id.to_string()));
        }

        let mut next = current.clone();
        mutator(&mut next)?;
        check_transition(current, &next)?;

        *current = next;
        Ok(current.clone())
    }

    fn list(&self) -> Vec<UploadJob> {
        let mut jobs: Vec<UploadJob> = self.read_jobs().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    fn counts(&self) -> JobCounts {
        self.read_jobs()
            .values()
            .fold(JobCounts::default(), |mut counts, job| {
                match job.status {
                    JobStatus::Processing => counts.processing += 1,
                    JobStatus::Success => counts.success += 1,
                    JobStatus::Failed => counts.failed += 1,
                }
                counts
            })
    }

    fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut jobs = self.write_jobs();
        let before = jobs.len();

        // An age limit reaching past the representable range keeps everything.
        if let Some(cutoff) = now.checked_sub_signed(self.retention.max_age) {
            jobs.retain(|_, job| !matches!(job.completed_at, Some(at) if at < cutoff));
        }

        let mut finished: Vec<(DateTime<Utc>, String)> = jobs
            .values()
            .filter_map(|job| job.completed_at.map(|at| (at, job.job_id.clone())))
            .collect();
        if finished.len() > self.retention.max_finished_jobs {
            finished.sort();
            let excess = finished.len() - self.retention.max_finished_jobs;
            for (_, job_id) in finished.into_iter().take(excess) {
                jobs.remove(&job_id);
            }
        }

        before - jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(job_id: &str, update: JobUpdate) -> JobProgressEvent {
        JobProgressEvent::new(job_id, update)
    }

    fn started(job_id: &str, triples: usize, batches: usize) -> JobProgressEvent {
        event(
            job_id,
            JobUpdate::Started {
                total_triples: triples,
                total_batches: batches,
            },
        )
    }

    fn batch(job_id: &str, batch: usize, processed: usize) -> JobProgressEvent {
        event(
            job_id,
            JobUpdate::BatchStored {
                batch,
                processed_triples: processed,
            },
        )
    }

    fn completed(job_id: &str) -> JobProgressEvent {
        event(
            job_id,
            JobUpdate::Completed {
                result: Arc::new(Vec::new()),
            },
        )
    }

    #[test]
    fn test_create_and_get() {
        let store = MemoryJobStore::default();
        let job = store.create("lehrplan.ttl", "BY");

        let fetched = store.get(&job.job_id).unwrap();
        assert_eq!(fetched.filename, "lehrplan.ttl");
        assert_eq!(fetched.federal_state, "BY");
        assert_eq!(fetched.status, JobStatus::Processing);
        assert_eq!(fetched.phase, JobPhase::Queued);
        assert!(Uuid::parse_str(&fetched.job_id).is_ok());
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_ingest_progress() {
        let store = MemoryJobStore::default();
        let id = store.create("a.ttl", "BY").job_id;

        store.apply(&started(&id, 250, 3)).unwrap();
        let job = store.apply(&batch(&id, 1, 100)).unwrap();
        assert_eq!(job.phase, JobPhase::Ingesting);
        assert_eq!(job.current_batch, 1);
        assert!((job.progress - 40.0).abs() < f64::EPSILON);

        store.apply(&batch(&id, 2, 200)).unwrap();
        let job = store.apply(&batch(&id, 3, 250)).unwrap();
        assert_eq!(job.processed_triples, 250);
        assert!((job.progress - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_out_of_order_batches_are_rejected() {
        let store = MemoryJobStore::default();
        let id = store.create("a.ttl", "BY").job_id;
        store.apply(&started(&id, 250, 3)).unwrap();
        store.apply(&batch(&id, 2, 200)).unwrap();

        assert!(matches!(
            store.apply(&batch(&id, 1, 100)),
            Err(JobStoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            store.apply(&batch(&id, 3, 300)),
            Err(JobStoreError::InvalidTransition { .. })
        ));
        assert_eq!(store.get(&id).unwrap().processed_triples, 200);
    }

    #[test]
    fn test_analysis_requires_finished_ingest() {
        let store = MemoryJobStore::default();
        let id = store.create("a.ttl", "BY").job_id;
        store.apply(&started(&id, 250, 3)).unwrap();
        store.apply(&batch(&id, 1, 100)).unwrap();

        assert!(store.apply(&event(&id, JobUpdate::AnalysisStarted)).is_err());

        store.apply(&batch(&id, 2, 200)).unwrap();
        store.apply(&batch(&id, 3, 250)).unwrap();
        let job = store.apply(&event(&id, JobUpdate::AnalysisStarted)).unwrap();
        assert_eq!(job.phase, JobPhase::Analyzing);
        assert_eq!(job.analysis_progress.as_ref().unwrap().progress, 0.0);
    }

    #[test]
    fn test_analysis_progress_cannot_decrease() {
        let store = MemoryJobStore::default();
        let id = store.create("a.ttl", "BY").job_id;
        store.apply(&started(&id, 0, 0)).unwrap();
        store.apply(&event(&id, JobUpdate::AnalysisStarted)).unwrap();

        let step = |progress: f64| {
            event(
                &id,
                JobUpdate::AnalysisStep {
                    progress,
                    message: "Analyzing".to_string(),
                },
            )
        };
        store.apply(&step(50.0)).unwrap();
        assert!(store.apply(&step(25.0)).is_err());
        assert!(store.apply(&step(150.0)).is_err());
        store.apply(&step(100.0)).unwrap();
    }

    #[test]
    fn test_terminal_records_are_frozen() {
        let store = MemoryJobStore::default();
        let id = store.create("a.ttl", "BY").job_id;
        let job = store.apply(&completed(&id)).unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert!(job.result_data.is_some());
        assert!(job.error_message.is_none());
        assert!(job.completed_at.is_some());

        let failure = event(
            &id,
            JobUpdate::Failed {
                error: "late".to_string(),
            },
        );
        assert_eq!(
            store.apply(&failure),
            Err(JobStoreError::AlreadyFinished(id.clone()))
        );
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Success);
    }

    #[test]
    fn test_failure_carries_error_only() {
        let store = MemoryJobStore::default();
        let id = store.create("a.ttl", "BY").job_id;
        let job = store
            .apply(&event(
                &id,
                JobUpdate::Failed {
                    error: "Triple store unreachable".to_string(),
                },
            ))
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("Triple store unreachable"));
        assert!(job.result_data.is_none());
    }

    #[test]
    fn test_update_rejects_invalid_mutation() {
        let store = MemoryJobStore::default();
        let id = store.create("a.ttl", "BY").job_id;

        let result = store.update(&id, &mut |job| {
            job.status = JobStatus::Success;
            Ok(())
        });
        assert!(matches!(result, Err(JobStoreError::InvalidTransition { .. })));
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Processing);

        assert_eq!(
            store.update("missing", &mut |_| Ok(())),
            Err(JobStoreError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_list_and_counts() {
        let store = MemoryJobStore::default();
        let first = store.create("a.ttl", "BY").job_id;
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.create("b.ttl", "NRW").job_id;
        store.apply(&completed(&first)).unwrap();

        let listed: Vec<_> = store.list().into_iter().map(|j| j.job_id).collect();
        assert_eq!(listed, vec![second, first]);
        assert_eq!(
            store.counts(),
            JobCounts {
                processing: 1,
                success: 1,
                failed: 0,
            }
        );
    }

    #[test]
    fn test_retention_keeps_processing_jobs() {
        let store = MemoryJobStore::new(RetentionPolicy {
            max_finished_jobs: 1,
            max_age: Duration::hours(1),
        });
        let running = store.create("a.ttl", "BY").job_id;
        let old = store.create("b.ttl", "BY").job_id;
        let recent = store.create("c.ttl", "BY").job_id;
        store.apply(&completed(&old)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.apply(&completed(&recent)).unwrap();

        assert_eq!(store.evict_expired(Utc::now()), 1);
        assert!(store.get(&old).is_none());
        assert!(store.get(&recent).is_some());

        assert_eq!(store.evict_expired(Utc::now() + Duration::hours(2)), 1);
        assert!(store.get(&recent).is_none());
        assert!(store.get(&running).is_some());
    }

    #[test]
    fn test_unbounded_max_age_does_not_overflow() {
        let store = MemoryJobStore::new(RetentionPolicy {
            max_finished_jobs: 10,
            max_age: Duration::MAX,
        });
        let done = store.create("a.ttl", "BY").job_id;
        store.apply(&completed(&done)).unwrap();

        let next = store.create("b.ttl", "BY").job_id;
        assert_eq!(store.evict_expired(Utc::now()), 0);
        assert!(store.get(&done).is_some());
        assert!(store.get(&next).is_some());
    }
}
