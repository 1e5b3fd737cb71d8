//! Batch upload of parsed statements into the tenant graph.

use std::thread;

use log::debug;
use tracing::info_span;

use crate::broadcast::job_progress::JobUpdate;
use crate::document::Statement;
use crate::triplestore::TripleStore;

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::progress::ProgressReporter;

/// Number of batches needed for `total_triples` statements.
pub fn total_batches(total_triples: usize, batch_size: usize) -> usize {
    total_triples.div_ceil(batch_size.max(1))
}

/// Pushes `statements` to `graph` in order, one batch per store call.
///
/// Reports `Started` before the first batch and `BatchStored` after each
/// accepted batch. The first failing batch aborts the ingest; batches already
/// stored are left in place.
pub fn ingest(
    store: &dyn TripleStore,
    config: &PipelineConfig,
    graph: &str,
    statements: &[Statement],
    progress: &dyn ProgressReporter,
) -> Result<usize, PipelineError> {
    let batch_size = config.batch_size.max(1);
    let total_triples = statements.len();
    let total_batches = total_batches(total_triples, batch_size);

    progress.report(JobUpdate::Started {
        total_triples,
        total_batches,
    })?;

    if config.clear_before_upload {
        store
            .clear_graph(graph)
            .map_err(|source| PipelineError::ClearGraph {
                graph: graph.to_string(),
                source,
            })?;
    }

    let mut processed_triples = 0;
    for (index, chunk) in statements.chunks(batch_size).enumerate() {
        let batch = index + 1;
        let _span = info_span!("batch", batch, size = chunk.len()).entered();

        store
            .insert_batch(graph, chunk)
            .map_err(|source| PipelineError::Batch {
                batch,
                total_batches,
                source,
            })?;
        processed_triples += chunk.len();
        debug!(
            "Stored batch {}/{} ({}/{} triples)",
            batch, total_batches, processed_triples, total_triples
        );

        progress.report(JobUpdate::BatchStored {
            batch,
            processed_triples,
        })?;

        if batch < total_batches && !config.batch_delay.is_zero() {
            thread::sleep(config.batch_delay);
        }
    }

    Ok(processed_triples)
}
