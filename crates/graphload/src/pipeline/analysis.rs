//! Matches the tenant graph against the class catalog and builds the result tabs.

use std::cmp::Reverse;

use log::debug;

use crate::broadcast::job_progress::JobUpdate;
use crate::catalog::{CatalogClass, ClassCatalog};
use crate::document::local_name;
use crate::triplestore::{Instance, TripleStore};

use super::error::PipelineError;
use super::progress::ProgressReporter;
use super::result::{
    summary_text, AnalysisResults, ClassSummary, InstanceRow, ResultTab, UploadInfo, SUMMARY_LABEL,
};

/// What the analysis needs to know about the finished ingest.
pub struct AnalysisScope<'a> {
    pub federal_state: &'a str,
    pub graph: &'a str,
    pub total_triples: usize,
}

/// Queries the instances of every catalog class and returns the summary tab
/// followed by one table tab per class with instances.
///
/// Classes are listed by instance count (descending), ties by label.
pub fn analyze(
    store: &dyn TripleStore,
    catalog: &ClassCatalog,
    scope: &AnalysisScope<'_>,
    progress: &dyn ProgressReporter,
) -> Result<Vec<ResultTab>, PipelineError> {
    progress.report(JobUpdate::AnalysisStarted)?;

    let classes = catalog.classes();
    let mut found: Vec<(&CatalogClass, Vec<InstanceRow>)> = Vec::new();

    if classes.is_empty() {
        progress.report(JobUpdate::AnalysisStep {
            progress: 100.0,
            message: "No class definitions loaded".to_string(),
        })?;
    }

    for (index, class) in classes.iter().enumerate() {
        let instances = store
            .find_instances(scope.graph, &class.uri)
            .map_err(|source| PipelineError::Analysis {
                class_uri: class.uri.clone(),
                source,
            })?;
        debug!("Class {} has {} instances", class.uri, instances.len());

        if !instances.is_empty() {
            found.push((class, instances.into_iter().map(instance_row).collect()));
        }

        let done = index + 1;
        progress.report(JobUpdate::AnalysisStep {
            progress: done as f64 / classes.len() as f64 * 100.0,
            message: format!("Analyzed class {}/{}: {}", done, classes.len(), class.label),
        })?;
    }

    found.sort_by(|(a, a_rows), (b, b_rows)| {
        (Reverse(a_rows.len()), &a.label).cmp(&(Reverse(b_rows.len()), &b.label))
    });

    let results = AnalysisResults {
        total_triples: scope.total_triples,
        class_definitions_loaded: catalog.len(),
        found_classes_count: found.len(),
        class_list: found
            .iter()
            .map(|(class, rows)| ClassSummary {
                label: class.label.clone(),
                instance_count: rows.len(),
                uri: class.uri.clone(),
            })
            .collect(),
    };

    let mut tabs = Vec::with_capacity(found.len() + 1);
    tabs.push(ResultTab::Summary {
        label: SUMMARY_LABEL.to_string(),
        content: summary_text(&results),
        upload_info: UploadInfo {
            status: "Success".to_string(),
            message: "Document uploaded and stored successfully".to_string(),
            federal_state: scope.federal_state.to_string(),
            graph_id: scope.federal_state.to_string(),
            graph_name: scope.graph.to_string(),
            triples_count: scope.total_triples,
            sparql_endpoint: store.sparql_endpoint(),
            analysis_results: Some(results),
        },
    });
    tabs.extend(found.into_iter().map(|(class, rows)| ResultTab::Table {
        label: format!("{} ({})", class.label, rows.len()),
        class_label: class.label.clone(),
        class_uri: class.uri.clone(),
        content: String::new(),
        data: rows,
    }));

    Ok(tabs)
}

fn instance_row(instance: Instance) -> InstanceRow {
    let label = match instance.label {
        Some(label) if !label.trim().is_empty() => label,
        _ => local_name(&instance.uri).to_string(),
    };
    InstanceRow {
        label,
        uri: instance.uri,
    }
}
