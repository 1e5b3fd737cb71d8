//! Class-definition catalog.
//!
//! The catalog is reference data: a JSON object mapping a class id to its URI
//! and display labels. It is loaded once at startup and shared read-only by all
//! workers.

pub mod extract;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::document::local_name;
use crate::error::CatalogError;

pub use extract::extract_from_ontology;

/// One entry of the catalog file.
///
/// Both label spellings are accepted: `label_de`/`label_en`/`display_label`
/// as written by hand-maintained catalogs and `german_label`/`english_label`
/// as written by [`extract_from_ontology`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_de: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub german_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ClassDefinition {
    /// Label shown to users, German first, falling back to the URI's local name.
    pub fn resolve_label(&self, uri: &str) -> String {
        [
            &self.label_de,
            &self.label_en,
            &self.display_label,
            &self.german_label,
            &self.english_label,
        ]
        .into_iter()
        .flatten()
        .find(|label| !label.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| local_name(uri).to_string())
    }
}

/// A catalog class that can be matched against instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogClass {
    pub id: String,
    pub uri: String,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClassCatalog {
    definitions: BTreeMap<String, ClassDefinition>,
    classes: Vec<CatalogClass>,
}

impl ClassCatalog {
    /// Builds a catalog from id → definition entries.
    ///
    /// Entries without a URI are kept in the definition count but cannot be
    /// matched. When two ids share a URI, the first id (in id order) wins.
    pub fn from_definitions(definitions: BTreeMap<String, ClassDefinition>) -> Self {
        let mut seen = HashSet::new();
        let classes = definitions
            .iter()
            .filter_map(|(id, def)| {
                let uri = def.uri.as_deref()?.trim();
                if uri.is_empty() || !seen.insert(uri.to_string()) {
                    return None;
                }
                Some(CatalogClass {
                    id: id.clone(),
                    uri: uri.to_string(),
                    label: def.resolve_label(uri),
                })
            })
            .collect();

        Self {
            definitions,
            classes,
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let definitions: BTreeMap<String, ClassDefinition> = serde_json::from_str(content)?;
        Ok(Self::from_definitions(definitions))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&content)?;
        info!(
            "Loaded {} class definitions ({} with a URI) from {}",
            catalog.len(),
            catalog.classes.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Loads the catalog, treating a missing file as an empty catalog.
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Class catalog {} not found, analysis will find no classes",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Writes the definitions as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CatalogError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.definitions)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::WriteFile {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| CatalogError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Number of definitions loaded, including those without a URI.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Matchable classes in id order.
    pub fn classes(&self) -> &[CatalogClass] {
        &self.classes
    }

    pub fn definitions(&self) -> &BTreeMap<String, ClassDefinition> {
        &self.definitions
    }

    pub fn class_by_uri(&self, uri: &str) -> Option<&CatalogClass> {
        self.classes.iter().find(|c| c.uri == uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CATALOG_JSON: &str = r#"
    {
        "teacher": {
            "uri": "http://example.org/onto#Teacher",
            "label_de": "Lehrkraft",
            "label_en": "Teacher"
        },
        "subject": {
            "uri": "http://example.org/onto/Subject",
            "english_label": "Subject"
        },
        "unlabelled": {
            "uri": "http://example.org/onto/Competence"
        },
        "abstract": {
            "label_en": "No URI"
        },
        "teacher_alias": {
            "uri": "http://example.org/onto#Teacher",
            "label_en": "Alias"
        }
    }
    "#;

    #[test]
    fn test_label_resolution_order() {
        let catalog = ClassCatalog::from_json_str(CATALOG_JSON).unwrap();

        let teacher = catalog.class_by_uri("http://example.org/onto#Teacher").unwrap();
        assert_eq!(teacher.label, "Lehrkraft");
        assert_eq!(teacher.id, "teacher");

        let subject = catalog.class_by_uri("http://example.org/onto/Subject").unwrap();
        assert_eq!(subject.label, "Subject");

        let competence = catalog
            .class_by_uri("http://example.org/onto/Competence")
            .unwrap();
        assert_eq!(competence.label, "Competence");
    }

    #[test]
    fn test_counts_and_uri_deduplication() {
        let catalog = ClassCatalog::from_json_str(CATALOG_JSON).unwrap();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.classes().len(), 3);
    }

    #[test]
    fn test_blank_labels_are_skipped() {
        let def = ClassDefinition {
            label_de: Some("  ".to_string()),
            label_en: Some("Course".to_string()),
            ..Default::default()
        };
        assert_eq!(def.resolve_label("http://example.org/Course"), "Course");
    }

    #[test]
    fn test_missing_file_gives_empty_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = ClassCatalog::load_or_empty(temp_dir.path().join("missing.json")).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.classes().is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ClassCatalog::load_or_empty(&path),
            Err(CatalogError::ParseJson(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("references").join("class_definitions.json");

        let catalog = ClassCatalog::from_json_str(CATALOG_JSON).unwrap();
        catalog.save(&path).unwrap();

        let loaded = ClassCatalog::load(&path).unwrap();
        assert_eq!(loaded.definitions(), catalog.definitions());
        assert_eq!(loaded.classes(), catalog.classes());
    }
}
