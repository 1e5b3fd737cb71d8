//! Triple store clients.
//!
//! The pipeline only needs three operations from the store: append a batch of
//! statements to a named graph, list the instances of a class in a graph, and
//! drop a graph. [`VirtuosoStore`] speaks the Virtuoso HTTP endpoints,
//! [`MemoryStore`] keeps graphs in process for tests and local runs.

pub mod memory;
pub mod virtuoso;

use serde::{Deserialize, Serialize};

use crate::document::Statement;
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use virtuoso::VirtuosoStore;

/// An instance of a class found in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub uri: String,
    /// First `rdfs:label` of the instance, if any.
    pub label: Option<String>,
}

pub trait TripleStore: Send + Sync {
    /// Appends statements to `graph`. One call is one network operation.
    fn insert_batch(&self, graph: &str, statements: &[Statement]) -> Result<(), StoreError>;

    /// Lists the distinct instances typed `class_uri` in `graph`, in store order.
    fn find_instances(&self, graph: &str, class_uri: &str) -> Result<Vec<Instance>, StoreError>;

    /// Removes every statement of `graph`. Clearing a missing graph succeeds.
    fn clear_graph(&self, graph: &str) -> Result<(), StoreError>;

    /// Query endpoint reported to clients in the upload summary.
    fn sparql_endpoint(&self) -> String;
}

/// Builds the named graph IRI for a tenant.
pub fn graph_iri(graph_base: &str, federal_state: &str) -> String {
    format!("{}/{}", graph_base.trim_end_matches('/'), federal_state)
}

/// Checks that an IRI can be embedded between `<` and `>` in a SPARQL query.
pub fn ensure_embeddable_iri(iri: &str) -> Result<(), StoreError> {
    let forbidden = |c: char| {
        c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
    };
    if iri.is_empty() || iri.chars().any(forbidden) || !iri.contains(':') {
        return Err(StoreError::InvalidIri(iri.to_string()));
    }
    Ok(())
}
