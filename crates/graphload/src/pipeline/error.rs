use thiserror::Error;

use crate::error::{JobStoreError, ParseError, StoreError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("Failed to store batch {batch} of {total_batches}: {source}")]
    Batch {
        batch: usize,
        total_batches: usize,
        #[source]
        source: StoreError,
    },

    #[error("Failed to clear graph {graph}: {source}")]
    ClearGraph {
        graph: String,
        #[source]
        source: StoreError,
    },

    #[error("Analysis of class {class_uri} failed: {source}")]
    Analysis {
        class_uri: String,
        #[source]
        source: StoreError,
    },

    /// The job record refused an update, typically because the job was
    /// completed by hand while the worker was still running.
    #[error("Job record rejected progress update: {0}")]
    Rejected(#[from] JobStoreError),
}
