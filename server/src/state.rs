//! Application state shared by the request handlers.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use graphload::broadcast::{JobProgressBroadcaster, MemoryJobStore};
use graphload::catalog::ClassCatalog;
use graphload::config::{resolve_store_password, Config, StoreKind};
use graphload::pipeline::{Pipeline, PipelineConfig};
use graphload::service::UploadService;
use graphload::triplestore::{MemoryStore, TripleStore, VirtuosoStore};
use graphload::worker::crossbeam_channel::Receiver;
use graphload::worker::JobResult;
use log::{info, warn};

use crate::error::StartupError;

pub struct AppState {
    pub config: Config,
    pub service: UploadService,
}

impl AppState {
    /// Builds the triple store and catalog named by `config` and starts the
    /// workers.
    ///
    /// Must be called outside an async context: the Virtuoso client is blocking.
    pub fn from_config(config: Config) -> Result<Self, StartupError> {
        let store = build_store(&config)?;
        let catalog = ClassCatalog::load_or_empty(&config.catalog_path)?;
        Ok(Self::with_parts(config, store, catalog))
    }

    pub fn with_parts(config: Config, store: Arc<dyn TripleStore>, catalog: ClassCatalog) -> Self {
        info!(
            "Loaded {} class definitions ({} matchable)",
            catalog.len(),
            catalog.classes().len()
        );

        let pipeline = Arc::new(Pipeline::new(
            Arc::new(PipelineConfig::from_config(&config)),
            store,
            Arc::new(catalog),
        ));
        let job_store = Arc::new(MemoryJobStore::new(config.retention.policy()));
        let service = UploadService::start(
            pipeline,
            job_store,
            JobProgressBroadcaster::default(),
            config.worker_count,
            config.queue_capacity(),
            config.server.max_upload_bytes,
        );

        Self { config, service }
    }

    /// Stops the workers, waiting for running jobs if this is the last handle.
    pub fn shutdown(state: Arc<Self>) {
        match Arc::try_unwrap(state) {
            Ok(state) => state.service.shutdown(),
            Err(state) => {
                warn!("Application state still in use; signalling workers without waiting");
                state.service.pool().shutdown();
            }
        }
    }
}

pub fn build_store(config: &Config) -> Result<Arc<dyn TripleStore>, StartupError> {
    match config.store.kind {
        StoreKind::Memory => {
            warn!("Using the in-memory triple store; uploads are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Virtuoso => {
            let password = resolve_store_password(&config.store)?;
            let store = VirtuosoStore::new(
                &config.store.url,
                &config.store.username,
                password,
                Duration::from_secs(config.store.request_timeout_secs),
                config.store.max_retries,
            )?;
            info!("Using Virtuoso at {}", store.sparql_endpoint());
            Ok(Arc::new(store))
        }
    }
}

/// Logs job results as workers publish them. Exits once every worker is gone.
pub fn spawn_result_logger(results: Receiver<JobResult>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("graphload-results".to_string())
        .spawn(move || {
            for result in results.iter() {
                if result.success {
                    info!(
                        "Job {} for {} succeeded with {} triples",
                        result.job_id, result.federal_state, result.triples
                    );
                } else {
                    warn!(
                        "Job {} for {} failed: {}",
                        result.job_id,
                        result.federal_state,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        })
}
