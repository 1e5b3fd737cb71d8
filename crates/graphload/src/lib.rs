pub mod broadcast;
pub mod catalog;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod triplestore;
pub mod worker;

pub use broadcast::{
    JobPhase, JobProgressBroadcaster, JobProgressEvent, JobStatus, JobStore, JobUpdate,
    MemoryJobStore, UploadJob,
};
pub use catalog::{extract_from_ontology, ClassCatalog, ClassDefinition};
pub use client::{ClientError, GraphloadClient, PollPolicy, UploadResponse};
pub use config::{load_config, load_config_or_default, Config, StoreKind};
pub use document::{parse_document, DocumentFormat, Statement};
pub use error::{
    CatalogError, ConfigError, GraphloadError, JobStoreError, ParseError, Result, StoreError,
    WorkerError,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, ResultTab};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use service::{JobSnapshot, ServiceError, UploadRequest, UploadService};
pub use triplestore::{MemoryStore, TripleStore, VirtuosoStore};
pub use worker::{Job, JobResult, WorkerPool};
