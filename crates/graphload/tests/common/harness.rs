//! Test harness wiring an upload service to in-memory stores.
//!
//! The harness keeps handles on the triple store and the job store so tests
//! can inspect what the workers did.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use graphload::broadcast::{JobProgressBroadcaster, JobUpdate, MemoryJobStore};
use graphload::catalog::ClassCatalog;
use graphload::error::JobStoreError;
use graphload::pipeline::{Pipeline, PipelineConfig, ProgressReporter};
use graphload::service::{JobSnapshot, UploadRequest, UploadService};
use graphload::triplestore::MemoryStore;

pub const GRAPH_BASE: &str = "http://localhost:8080/graph";

pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub job_store: Arc<MemoryJobStore>,
    pub pipeline: Arc<Pipeline>,
    pub service: UploadService,
}

impl TestHarness {
    /// One worker, batch size 100, no delay between batches.
    pub fn new(catalog: ClassCatalog) -> Self {
        Self::with_options(MemoryStore::new(), catalog, 100, 1, 4)
    }

    pub fn with_options(
        store: MemoryStore,
        catalog: ClassCatalog,
        batch_size: usize,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Self {
        let config = PipelineConfig {
            batch_size,
            batch_delay: Duration::ZERO,
            graph_base: GRAPH_BASE.to_string(),
            clear_before_upload: false,
        };
        Self::build(store, catalog, config, worker_count, queue_capacity)
    }

    /// One worker and a single-slot queue; every batch holds one triple and
    /// is followed by `batch_delay`, so jobs stay in flight long enough to
    /// observe.
    pub fn slow(catalog: ClassCatalog, batch_delay: Duration) -> Self {
        let config = PipelineConfig {
            batch_size: 1,
            batch_delay,
            graph_base: GRAPH_BASE.to_string(),
            clear_before_upload: false,
        };
        Self::build(MemoryStore::new(), catalog, config, 1, 1)
    }

    /// Like [`TestHarness::slow`] but with `worker_count` workers, so several
    /// jobs ingest at the same time.
    pub fn concurrent(catalog: ClassCatalog, batch_delay: Duration, worker_count: usize) -> Self {
        let config = PipelineConfig {
            batch_size: 1,
            batch_delay,
            graph_base: GRAPH_BASE.to_string(),
            clear_before_upload: false,
        };
        Self::build(MemoryStore::new(), catalog, config, worker_count, 4)
    }

    pub fn build(
        store: MemoryStore,
        catalog: ClassCatalog,
        config: PipelineConfig,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Self {
        let store = Arc::new(store);
        let job_store = Arc::new(MemoryJobStore::default());
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(config),
            store.clone(),
            Arc::new(catalog),
        ));
        let service = UploadService::start(
            Arc::clone(&pipeline),
            job_store.clone(),
            JobProgressBroadcaster::default(),
            worker_count,
            queue_capacity,
            64 * 1024 * 1024,
        );

        Self {
            store,
            job_store,
            pipeline,
            service,
        }
    }

    pub fn graph(&self, federal_state: &str) -> String {
        format!("{}/{}", GRAPH_BASE, federal_state)
    }

    pub fn submit(&self, filename: &str, federal_state: &str, bytes: Vec<u8>) -> String {
        self.service
            .submit(UploadRequest {
                filename: filename.to_string(),
                federal_state: federal_state.to_string(),
                bytes,
            })
            .expect("upload should be accepted")
            .job_id
    }

    /// Polls the job until it finishes or `timeout` passes.
    pub fn wait_for(&self, job_id: &str, timeout: Duration) -> JobSnapshot {
        let deadline = Instant::now() + timeout;
        loop {
            let snapshot = self.service.status(job_id).expect("job should exist");
            if snapshot.is_finished() {
                return snapshot;
            }
            assert!(
                Instant::now() < deadline,
                "job {} did not finish within {:?}: {:?}",
                job_id,
                timeout,
                snapshot.job.phase
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn shutdown(self) {
        self.service.shutdown();
    }
}

/// Records every update the pipeline reports.
#[derive(Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<JobUpdate>>,
}

impl RecordingProgress {
    pub fn updates(&self) -> Vec<JobUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, update: JobUpdate) -> Result<(), JobStoreError> {
        self.updates.lock().unwrap().push(update);
        Ok(())
    }
}
