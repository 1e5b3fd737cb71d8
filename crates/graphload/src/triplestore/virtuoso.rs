//! Virtuoso client.
//!
//! Batches are appended through the authenticated SPARQL Graph Store endpoint
//! (`/sparql-graph-crud-auth`), queries go to the public `/sparql` endpoint.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::document::{to_ntriples, Statement, RDFS_LABEL};
use crate::error::StoreError;
use crate::sanitize::{redact_url, truncate_body};

use super::{ensure_embeddable_iri, Instance, TripleStore};

const GRAPH_CRUD_PATH: &str = "/sparql-graph-crud-auth";
const SPARQL_PATH: &str = "/sparql";
const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Statuses worth retrying; anything else is returned to the caller at once.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub struct VirtuosoStore {
    client: Client,
    base_url: String,
    username: String,
    password: SecretString,
    max_retries: u32,
    retry_delay: Duration,
}

impl VirtuosoStore {
    pub fn new(
        base_url: &str,
        username: &str,
        password: SecretString,
        request_timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password,
            max_retries,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Overrides the initial backoff between retries (doubled after each attempt).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn graph_crud_url(&self) -> String {
        format!("{}{}", self.base_url, GRAPH_CRUD_PATH)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.username, Some(self.password.expose_secret()))
    }

    /// Sends a request, retrying transport errors and retryable statuses with
    /// exponential backoff. The final response is returned whatever its status.
    fn send_with_retry<F>(&self, operation: &str, build: F) -> Result<Response, StoreError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut delay = self.retry_delay;
        let mut attempt = 0;
        loop {
            let outcome = build().send();
            let retryable = match &outcome {
                Ok(response) => RETRYABLE_STATUSES.contains(&response.status().as_u16()),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if !retryable || attempt >= self.max_retries {
                return outcome.map_err(|e| {
                    StoreError::Transport(format!(
                        "{} against {} failed: {}",
                        operation,
                        redact_url(&self.base_url),
                        e.without_url()
                    ))
                });
            }

            attempt += 1;
            match &outcome {
                Ok(response) => warn!(
                    "{} returned HTTP {}, retrying ({}/{}) in {:?}",
                    operation,
                    response.status(),
                    attempt,
                    self.max_retries,
                    delay
                ),
                Err(e) => warn!(
                    "{} failed ({}), retrying ({}/{}) in {:?}",
                    operation,
                    if e.is_timeout() { "timeout" } else { "connection refused" },
                    attempt,
                    self.max_retries,
                    delay
                ),
            }
            thread::sleep(delay);
            delay *= 2;
        }
    }
}

fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(StoreError::Http {
        status: status.as_u16(),
        body: truncate_body(&body),
    })
}

impl TripleStore for VirtuosoStore {
    fn insert_batch(&self, graph: &str, statements: &[Statement]) -> Result<(), StoreError> {
        let body = to_ntriples(statements);
        let url = self.graph_crud_url();
        debug!(
            "Posting {} statements ({} bytes) to graph {}",
            statements.len(),
            body.len(),
            graph
        );

        let response = self.send_with_retry("Batch insert", || {
            self.authed(self.client.post(&url))
                .query(&[("graph", graph)])
                .header(reqwest::header::CONTENT_TYPE, "text/turtle")
                .body(body.clone())
        })?;
        check_status(response).map(|_| ())
    }

    fn find_instances(&self, graph: &str, class_uri: &str) -> Result<Vec<Instance>, StoreError> {
        let query = instance_query(graph, class_uri)?;
        let url = format!("{}{}", self.base_url, SPARQL_PATH);

        let response = self.send_with_retry("Instance query", || {
            self.client
                .get(&url)
                .query(&[("query", query.as_str()), ("format", SPARQL_RESULTS_JSON)])
                .header(reqwest::header::ACCEPT, SPARQL_RESULTS_JSON)
        })?;
        let body = check_status(response)?
            .text()
            .map_err(|e| StoreError::Transport(e.without_url().to_string()))?;
        parse_instance_results(&body)
    }

    fn clear_graph(&self, graph: &str) -> Result<(), StoreError> {
        let url = self.graph_crud_url();
        let response = self.send_with_retry("Graph clear", || {
            self.authed(self.client.delete(&url)).query(&[("graph", graph)])
        })?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Graph {} did not exist, nothing to clear", graph);
            return Ok(());
        }
        check_status(response).map(|_| ())
    }

    fn sparql_endpoint(&self) -> String {
        format!("{}{}", redact_url(&self.base_url), SPARQL_PATH)
    }
}

/// Builds the SELECT for the instances of a class and their optional label.
pub(crate) fn instance_query(graph: &str, class_uri: &str) -> Result<String, StoreError> {
    ensure_embeddable_iri(graph)?;
    ensure_embeddable_iri(class_uri)?;
    Ok(format!(
        "SELECT ?instance ?label WHERE {{ GRAPH <{graph}> {{ \
         ?instance a <{class_uri}> . \
         OPTIONAL {{ ?instance <{RDFS_LABEL}> ?label }} }} }}"
    ))
}

#[derive(Debug, Deserialize)]
struct SelectResults {
    results: SelectBindings,
}

#[derive(Debug, Deserialize)]
struct SelectBindings {
    bindings: Vec<InstanceBinding>,
}

#[derive(Debug, Deserialize)]
struct InstanceBinding {
    instance: BoundValue,
    label: Option<BoundValue>,
}

#[derive(Debug, Deserialize)]
struct BoundValue {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

/// Parses SPARQL JSON results, keeping one row per instance (its first label).
pub(crate) fn parse_instance_results(body: &str) -> Result<Vec<Instance>, StoreError> {
    let results: SelectResults = serde_json::from_str(body)
        .map_err(|e| StoreError::InvalidResponse(format!("invalid SPARQL JSON results: {}", e)))?;

    let mut seen = HashSet::new();
    let mut instances: Vec<Instance> = Vec::new();
    for binding in results.results.bindings {
        let uri = if binding.instance.kind == "bnode" {
            format!("_:{}", binding.instance.value)
        } else {
            binding.instance.value
        };
        let label = binding.label.map(|l| l.value);

        if seen.insert(uri.clone()) {
            instances.push(Instance { uri, label });
        } else if let Some(label) = label {
            if let Some(existing) = instances.iter_mut().find(|i| i.uri == uri) {
                existing.label.get_or_insert(label);
            }
        }
    }
    Ok(instances)
}
