use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::broadcast::job_progress::JobProgressBroadcaster;
use crate::broadcast::job_store::JobStore;
use crate::error::WorkerError;
use crate::pipeline::{Pipeline, StoreProgress};
use crate::worker::job::{Job, JobResult};

/// Fixed set of worker threads consuming a bounded job queue.
pub struct WorkerPool {
    job_sender: Sender<Job>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    queue_capacity: usize,
}

impl WorkerPool {
    /// Starts `worker_count` workers sharing one pipeline.
    ///
    /// Progress of every job is applied to `job_store` and streamed on
    /// `broadcaster`.
    ///
    /// # Panics
    /// Panics if `worker_count` or `queue_capacity` is 0.
    pub fn new(
        pipeline: Arc<Pipeline>,
        job_store: Arc<dyn JobStore>,
        broadcaster: JobProgressBroadcaster,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        assert!(queue_capacity > 0, "queue_capacity must be > 0");
        let (job_sender, job_receiver) = bounded::<Job>(queue_capacity);
        let (result_sender, result_receiver) = bounded::<JobResult>(queue_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let context = WorkerContext {
                worker_id,
                job_receiver: job_receiver.clone(),
                result_sender: result_sender.clone(),
                shutdown: Arc::clone(&shutdown),
                pipeline: Arc::clone(&pipeline),
                job_store: Arc::clone(&job_store),
                broadcaster: broadcaster.clone(),
            };

            let handle = thread::Builder::new()
                .name(format!("graphload-worker-{}", worker_id))
                .spawn(move || run_worker(context));
            match handle {
                Ok(handle) => workers.push(handle),
                Err(e) => error!("Failed to spawn worker {}: {}", worker_id, e),
            }
        }

        info!(
            "Started {} workers (queue capacity {})",
            workers.len(),
            queue_capacity
        );

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
            queue_capacity,
        }
    }

    /// Queues a job, blocking while the queue is full.
    pub fn submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Queues a job without blocking.
    pub fn try_submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => WorkerError::QueueFull,
            TrySendError::Disconnected(_) => WorkerError::ChannelClosed,
        })
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    /// Receiver of job results, for draining on another thread.
    pub fn results(&self) -> Receiver<JobResult> {
        self.result_receiver.clone()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

struct WorkerContext {
    worker_id: usize,
    job_receiver: Receiver<Job>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    job_store: Arc<dyn JobStore>,
    broadcaster: JobProgressBroadcaster,
}

fn run_worker(ctx: WorkerContext) {
    let worker_id = ctx.worker_id;
    debug!("Worker {} started", worker_id);

    loop {
        if ctx.shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match ctx
            .job_receiver
            .recv_timeout(std::time::Duration::from_millis(100))
        {
            Ok(job) => {
                debug!("Worker {} processing job {}", worker_id, job.id);

                let progress =
                    StoreProgress::new(&job.id, Arc::clone(&ctx.job_store), ctx.broadcaster.clone());
                let result = ctx.pipeline.run(&job, &progress);

                // Results are informational; a full result queue must not stall the worker.
                match ctx.result_sender.try_send(result) {
                    Ok(()) => {}
                    Err(TrySendError::Full(result)) => {
                        warn!(
                            "Worker {} dropped result of job {}: result queue full",
                            worker_id, result.job_id
                        );
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        debug!("Worker {} result channel disconnected", worker_id);
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::job_progress::JobStatus;
    use crate::broadcast::job_store::MemoryJobStore;
    use crate::catalog::ClassCatalog;
    use crate::document::DocumentFormat;
    use crate::pipeline::PipelineConfig;
    use crate::triplestore::MemoryStore;
    use std::time::Duration;

    fn create_test_pipeline() -> Arc<Pipeline> {
        let config = PipelineConfig {
            batch_size: 100,
            batch_delay: Duration::ZERO,
            graph_base: "http://localhost:8080/graph".to_string(),
            clear_before_upload: false,
        };
        Arc::new(Pipeline::new(
            Arc::new(config),
            Arc::new(MemoryStore::new()),
            Arc::new(ClassCatalog::default()),
        ))
    }

    #[test]
    fn test_worker_pool_creation() {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::default());
        let pool = WorkerPool::new(
            create_test_pipeline(),
            store,
            JobProgressBroadcaster::default(),
            2,
            4,
        );

        assert!(!pool.is_shutdown());
        assert_eq!(pool.queue_capacity(), 4);

        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(matches!(
            pool.try_submit(Job::detached("a.ttl", "BY", DocumentFormat::Turtle, Vec::new())),
            Err(WorkerError::ChannelClosed)
        ));

        pool.wait();
    }

    #[test]
    fn test_submit_and_process_job() {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::default());
        let pool = WorkerPool::new(
            create_test_pipeline(),
            Arc::clone(&store),
            JobProgressBroadcaster::default(),
            2,
            4,
        );

        let record = store.create("test.ttl", "BY");
        let document = b"<http://e.org/a> <http://e.org/p> \"x\" .\n".to_vec();
        let job = Job::new(&record.job_id, "test.ttl", "BY", DocumentFormat::Turtle, document);
        pool.submit(job).unwrap();

        let result = pool.recv_result().unwrap();
        assert!(result.success, "Job failed: {:?}", result.error);
        assert_eq!(result.triples, 1);

        let stored = store.get(&record.job_id).unwrap();
        assert_eq!(stored.status, JobStatus::Success);
        assert_eq!(stored.processed_triples, 1);

        pool.shutdown();
        pool.wait();
    }
}
