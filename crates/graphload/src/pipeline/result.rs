//! Result payload of a successful upload: a summary tab followed by one table
//! tab per class that has instances.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

pub const SUMMARY_LABEL: &str = "Summary";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ResultTab {
    Summary {
        label: String,
        /// Plain-text rendering of the summary for older clients.
        content: String,
        upload_info: UploadInfo,
    },
    Table {
        /// `"<class label> (<instance count>)"`.
        label: String,
        class_label: String,
        class_uri: String,
        content: String,
        data: Vec<InstanceRow>,
    },
}

impl ResultTab {
    pub fn label(&self) -> &str {
        match self {
            ResultTab::Summary { label, .. } | ResultTab::Table { label, .. } => label,
        }
    }

    pub fn upload_info(&self) -> Option<&UploadInfo> {
        match self {
            ResultTab::Summary { upload_info, .. } => Some(upload_info),
            ResultTab::Table { .. } => None,
        }
    }

    pub fn rows(&self) -> &[InstanceRow] {
        match self {
            ResultTab::Table { data, .. } => data,
            ResultTab::Summary { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInfo {
    pub status: String,
    pub message: String,
    pub federal_state: String,
    pub graph_id: String,
    pub graph_name: String,
    pub triples_count: usize,
    pub sparql_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_results: Option<AnalysisResults>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResults {
    pub total_triples: usize,
    pub class_definitions_loaded: usize,
    pub found_classes_count: usize,
    pub class_list: Vec<ClassSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub label: String,
    pub instance_count: usize,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRow {
    pub label: String,
    pub uri: String,
}

/// Renders the plain-text summary kept in the summary tab's `content`.
pub fn summary_text(results: &AnalysisResults) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Analysis results");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "Total triples: {}", results.total_triples);
    let _ = writeln!(
        out,
        "Class definitions loaded: {}",
        results.class_definitions_loaded
    );
    let _ = writeln!(
        out,
        "Classes with instances: {}",
        results.found_classes_count
    );
    for class in &results.class_list {
        let _ = writeln!(out, "- {}: {} instances", class.label, class.instance_count);
    }
    out
}

/// Minimal payload for a job completed by hand before analysis finished.
pub fn skipped_analysis_tabs(
    federal_state: &str,
    graph_name: &str,
    triples_count: usize,
    sparql_endpoint: &str,
) -> Vec<ResultTab> {
    vec![ResultTab::Summary {
        label: SUMMARY_LABEL.to_string(),
        content: format!(
            "Upload completed with {} triples.\nData analysis was skipped.",
            triples_count
        ),
        upload_info: UploadInfo {
            status: "Completed (analysis skipped)".to_string(),
            message: "Document uploaded, analysis incomplete".to_string(),
            federal_state: federal_state.to_string(),
            graph_id: federal_state.to_string(),
            graph_name: graph_name.to_string(),
            triples_count,
            sparql_endpoint: sparql_endpoint.to_string(),
            analysis_results: None,
        },
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_tab_wire_format() {
        let tab = ResultTab::Table {
            label: "Lehrkraft (1)".to_string(),
            class_label: "Lehrkraft".to_string(),
            class_uri: "http://example.org/onto#Teacher".to_string(),
            content: String::new(),
            data: vec![InstanceRow {
                label: "Alice".to_string(),
                uri: "http://example.org/alice".to_string(),
            }],
        };

        assert_eq!(
            serde_json::to_value(&tab).unwrap(),
            json!({
                "type": "table",
                "label": "Lehrkraft (1)",
                "classLabel": "Lehrkraft",
                "classUri": "http://example.org/onto#Teacher",
                "content": "",
                "data": [{ "label": "Alice", "uri": "http://example.org/alice" }]
            })
        );
    }

    #[test]
    fn test_skipped_analysis_summary() {
        let tabs = skipped_analysis_tabs(
            "BY",
            "http://localhost:8080/graph/BY",
            42,
            "http://localhost:8890/sparql",
        );
        assert_eq!(tabs.len(), 1);

        let value = serde_json::to_value(&tabs[0]).unwrap();
        assert_eq!(value["type"], "summary");
        assert_eq!(value["uploadInfo"]["federalState"], "BY");
        assert_eq!(value["uploadInfo"]["triplesCount"], 42);
        assert!(value["uploadInfo"].get("analysisResults").is_none());
    }

    #[test]
    fn test_summary_text_lists_classes() {
        let results = AnalysisResults {
            total_triples: 10,
            class_definitions_loaded: 3,
            found_classes_count: 2,
            class_list: vec![
                ClassSummary {
                    label: "Fach".to_string(),
                    instance_count: 4,
                    uri: "http://e.org/Fach".to_string(),
                },
                ClassSummary {
                    label: "Kompetenz".to_string(),
                    instance_count: 1,
                    uri: "http://e.org/Kompetenz".to_string(),
                },
            ],
        };

        let text = summary_text(&results);
        assert!(text.contains("Total triples: 10"));
        assert!(text.contains("- Fach: 4 instances"));
        assert!(text.contains("- Kompetenz: 1 instances"));
    }
}
