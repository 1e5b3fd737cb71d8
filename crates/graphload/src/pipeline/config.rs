use std::time::Duration;

use crate::config::Config;

/// Settings the pipeline reads on every run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Statements per `insert_batch` call.
    pub batch_size: usize,
    /// Pause between two batches; never applied after the last one.
    pub batch_delay: Duration,
    /// Prefix of the per-tenant graph IRI.
    pub graph_base: String,
    /// Drop the tenant graph before the first batch.
    pub clear_before_upload: bool,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.ingest.batch_size,
            batch_delay: Duration::from_millis(config.ingest.batch_delay_ms),
            graph_base: config.store.graph_base.clone(),
            clear_before_upload: config.store.clear_before_upload,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
