use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::document::{literal_value, subject_key, term_iri, Statement, RDFS_LABEL, RDF_TYPE};
use crate::error::StoreError;

use super::{Instance, TripleStore};

/// In-process triple store.
///
/// Besides local development it supports failure injection so the pipeline's
/// error paths can be exercised without a network.
pub struct MemoryStore {
    graphs: RwLock<HashMap<String, Vec<Statement>>>,
    insert_calls: AtomicUsize,
    fail_insert_at: Option<usize>,
    fail_queries: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            graphs: RwLock::new(HashMap::new()),
            insert_calls: AtomicUsize::new(0),
            fail_insert_at: None,
            fail_queries: false,
        }
    }

    /// Makes the `call`-th `insert_batch` call (1-based, counted across graphs) fail.
    pub fn with_failing_insert(mut self, call: usize) -> Self {
        self.fail_insert_at = Some(call);
        self
    }

    /// Makes every `find_instances` call fail.
    pub fn with_failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    /// Number of statements currently stored in `graph`.
    pub fn statement_count(&self, graph: &str) -> usize {
        self.read_graphs().get(graph).map_or(0, Vec::len)
    }

    /// Number of `insert_batch` calls seen so far, failed ones included.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn read_graphs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<Statement>>> {
        match self.graphs.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Memory store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_graphs(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<Statement>>> {
        match self.graphs.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Memory store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TripleStore for MemoryStore {
    fn insert_batch(&self, graph: &str, statements: &[Statement]) -> Result<(), StoreError> {
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_insert_at == Some(call) {
            return Err(StoreError::Unavailable(format!(
                "injected failure on insert call {}",
                call
            )));
        }

        let mut graphs = self.write_graphs();
        let stored = graphs.entry(graph.to_string()).or_default();
        let existing: HashSet<Statement> = stored.iter().cloned().collect();
        stored.extend(
            statements
                .iter()
                .filter(|s| !existing.contains(*s))
                .cloned(),
        );
        Ok(())
    }

    fn find_instances(&self, graph: &str, class_uri: &str) -> Result<Vec<Instance>, StoreError> {
        if self.fail_queries {
            return Err(StoreError::Unavailable("injected query failure".to_string()));
        }

        let graphs = self.read_graphs();
        let Some(statements) = graphs.get(graph) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut instances: Vec<Instance> = statements
            .iter()
            .filter(|t| t.predicate.as_str() == RDF_TYPE && term_iri(&t.object) == Some(class_uri))
            .map(|t| subject_key(&t.subject))
            .filter(|uri| seen.insert(uri.clone()))
            .map(|uri| Instance { uri, label: None })
            .collect();

        let mut labels: HashMap<String, String> = HashMap::new();
        for triple in statements
            .iter()
            .filter(|t| t.predicate.as_str() == RDFS_LABEL)
        {
            let subject = subject_key(&triple.subject);
            if seen.contains(&subject) {
                if let Some(value) = literal_value(&triple.object) {
                    labels.entry(subject).or_insert_with(|| value.to_string());
                }
            }
        }
        for instance in &mut instances {
            instance.label = labels.remove(&instance.uri);
        }

        Ok(instances)
    }

    fn clear_graph(&self, graph: &str) -> Result<(), StoreError> {
        self.write_graphs().remove(graph);
        Ok(())
    }

    fn sparql_endpoint(&self) -> String {
        "memory://graphload/sparql".to_string()
    }
}
