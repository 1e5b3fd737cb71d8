//! Builders for test documents and catalogs.

#![allow(dead_code)]

use std::collections::BTreeMap;

use graphload::catalog::{ClassCatalog, ClassDefinition};

pub const EX: &str = "http://example.org/";

/// Builds an N-Triples or Turtle document line by line.
pub struct DocumentBuilder {
    lines: Vec<String>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Adds `count` instances of `class_uri`, each with an `rdfs:label`.
    /// Every instance contributes two triples.
    pub fn instances(mut self, prefix: &str, class_uri: &str, count: usize) -> Self {
        for i in 0..count {
            let subject = format!("{}{}/{}", EX, prefix, i);
            self.lines.push(format!(
                "<{}> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <{}> .",
                subject, class_uri
            ));
            self.lines.push(format!(
                "<{}> <http://www.w3.org/2000/01/rdf-schema#label> \"{} {}\" .",
                subject, prefix, i
            ));
        }
        self
    }

    /// Adds `count` plain data triples that match no class.
    pub fn filler(mut self, count: usize) -> Self {
        for i in 0..count {
            self.lines.push(format!(
                "<{}item/{}> <{}value> \"{}\" .",
                EX, i, EX, i
            ));
        }
        self
    }

    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text.into_bytes()
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a class catalog.
pub struct CatalogBuilder {
    definitions: BTreeMap<String, ClassDefinition>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            definitions: BTreeMap::new(),
        }
    }

    pub fn class(mut self, id: &str, uri: &str, label: &str) -> Self {
        self.definitions.insert(
            id.to_string(),
            ClassDefinition {
                uri: Some(uri.to_string()),
                label_de: Some(label.to_string()),
                ..ClassDefinition::default()
            },
        );
        self
    }

    pub fn build(self) -> ClassCatalog {
        ClassCatalog::from_definitions(self.definitions)
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
