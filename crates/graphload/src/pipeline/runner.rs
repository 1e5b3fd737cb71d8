use std::sync::Arc;

use tracing::{info, info_span, warn};

use crate::broadcast::job_progress::JobUpdate;
use crate::catalog::ClassCatalog;
use crate::document::parse_document;
use crate::sanitize;
use crate::triplestore::{graph_iri, TripleStore};
use crate::worker::job::{Job, JobResult};

use super::analysis::{analyze, AnalysisScope};
use super::config::PipelineConfig;
use super::error::PipelineError;
use super::ingest::ingest;
use super::progress::{NoopProgress, ProgressReporter};
use super::result::ResultTab;

/// Parses, ingests and analyzes one upload.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    store: Arc<dyn TripleStore>,
    catalog: Arc<ClassCatalog>,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        store: Arc<dyn TripleStore>,
        catalog: Arc<ClassCatalog>,
    ) -> Self {
        Self {
            config,
            store,
            catalog,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TripleStore> {
        &self.store
    }

    /// Named graph receiving the uploads of a tenant.
    pub fn graph_for(&self, federal_state: &str) -> String {
        graph_iri(&self.config.graph_base, federal_state)
    }

    /// Run the full pipeline for a single upload, reporting every transition.
    ///
    /// Ends with exactly one terminal report (`Completed` or `Failed`), unless
    /// the job record rejects an update, in which case nothing more is reported.
    pub fn run(&self, job: &Job, progress: &dyn ProgressReporter) -> JobResult {
        let filename = sanitize::redact_filename(&job.filename);
        let _pipeline_span = info_span!("pipeline",
            job_id = %job.id,
            filename = %filename,
            federal_state = %job.federal_state,
        )
        .entered();

        match self.execute(job, progress) {
            Ok((triples, result)) => {
                let completed = JobUpdate::Completed {
                    result: Arc::clone(&result),
                };
                if let Err(e) = progress.report(completed) {
                    warn!("Job {} finished but its record refused the result: {}", job.id, e);
                    return JobResult::failure(job, e.to_string());
                }
                info!(
                    "Job {} completed: {} triples, {} result tabs",
                    job.id,
                    triples,
                    result.len()
                );
                JobResult::success(job, triples, result)
            }
            Err(PipelineError::Rejected(e)) => {
                warn!("Job {} stopped, progress update rejected: {}", job.id, e);
                JobResult::failure(job, e.to_string())
            }
            Err(e) => {
                let err_msg = e.to_string();
                warn!("Job {} failed: {}", job.id, err_msg);
                if let Err(rejected) = progress.report(JobUpdate::Failed {
                    error: err_msg.clone(),
                }) {
                    warn!("Job {} record refused the failure: {}", job.id, rejected);
                }
                JobResult::failure(job, err_msg)
            }
        }
    }

    /// Runs the pipeline on the calling thread without a job record.
    pub fn run_inline(&self, job: &Job) -> Result<Arc<Vec<ResultTab>>, PipelineError> {
        let _span = info_span!("pipeline_inline",
            filename = %sanitize::redact_filename(&job.filename),
            federal_state = %job.federal_state,
        )
        .entered();
        self.execute(job, &NoopProgress).map(|(_, result)| result)
    }

    fn execute(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<(usize, Arc<Vec<ResultTab>>), PipelineError> {
        let graph = self.graph_for(&job.federal_state);

        // Step 1: Parse document
        let statements = {
            let _step = info_span!("parse_document", format = %job.format).entered();
            let base_iri = format!("{}/", graph);
            let statements = parse_document(&job.document, job.format, Some(&base_iri))?;
            info!("Parsed {} triples from {}", statements.len(), job.format);
            statements
        };

        // Step 2: Ingest in batches
        let total_triples = {
            let _step = info_span!("ingest", graph = %graph).entered();
            ingest(
                self.store.as_ref(),
                &self.config,
                &graph,
                &statements,
                progress,
            )?
        };
        drop(statements);

        // Step 3: Analyze against the catalog
        let tabs = {
            let _step = info_span!("analysis", classes = self.catalog.classes().len()).entered();
            let scope = AnalysisScope {
                federal_state: &job.federal_state,
                graph: &graph,
                total_triples,
            };
            analyze(self.store.as_ref(), &self.catalog, &scope, progress)?
        };

        Ok((total_triples, Arc::new(tabs)))
    }
}
