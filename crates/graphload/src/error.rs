use std::path::PathBuf;
use thiserror::Error;

use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum GraphloadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Triple store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job store error: {0}")]
    JobStore(#[from] JobStoreError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to resolve store password: {0}")]
    Secret(#[from] SecretError),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read class catalog '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse class catalog JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to write class catalog '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse ontology: {0}")]
    Ontology(#[from] ParseError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid base IRI '{iri}': {reason}")]
    InvalidBaseIri { iri: String, reason: String },

    #[error("Invalid {format} document: {message}")]
    Syntax {
        format: &'static str,
        message: String,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Triple store request failed with HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Triple store unreachable: {0}")]
    Transport(String),

    #[error("Refusing to embed invalid IRI in a query: {0}")]
    InvalidIri(String),

    #[error("Unexpected triple store response: {0}")]
    InvalidResponse(String),

    #[error("Triple store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {0} has already finished")]
    AlreadyFinished(String),

    #[error("Invalid transition for job {job_id}: {reason}")]
    InvalidTransition { job_id: String, reason: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Job queue is full")]
    QueueFull,
}

pub type Result<T> = std::result::Result<T, GraphloadError>;
