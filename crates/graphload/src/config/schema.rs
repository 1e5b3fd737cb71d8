use serde::{Deserialize, Serialize};

use crate::broadcast::job_store::RetentionPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    /// JSON file mapping class ids to URIs and labels.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Bounded job queue size; defaults to twice the worker count.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_catalog_path() -> String {
    "references/class_definitions.json".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

impl Config {
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or(self.worker_count.max(1) * 2)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            ingest: IngestConfig::default(),
            catalog_path: default_catalog_path(),
            worker_count: default_worker_count(),
            queue_capacity: None,
            retention: RetentionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted upload body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Virtuoso,
    /// In-process store; data is lost on restart.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_username")]
    pub username: String,
    /// Password given inline. Prefer `password_file` or `password_env_var`.
    /// When no source is set the Virtuoso default `dba` is used.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_file: Option<String>,
    #[serde(default)]
    pub password_env_var: Option<String>,
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub clear_before_upload: bool,
}

fn default_store_url() -> String {
    "http://localhost:8890".to_string()
}

fn default_username() -> String {
    "dba".to_string()
}

fn default_graph_base() -> String {
    "http://localhost:8080/graph".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            url: default_store_url(),
            username: default_username(),
            password: None,
            password_file: None,
            password_env_var: None,
            graph_base: default_graph_base(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            clear_before_upload: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

fn default_batch_size() -> usize {
    2000
}

fn default_batch_delay_ms() -> u64 {
    1000
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_max_finished_jobs")]
    pub max_finished_jobs: usize,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

fn default_max_finished_jobs() -> usize {
    1000
}

fn default_max_age_secs() -> u64 {
    24 * 60 * 60
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_finished_jobs: default_max_finished_jobs(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        let max_age_secs = i64::try_from(self.max_age_secs).unwrap_or(i64::MAX);
        RetentionPolicy {
            max_finished_jobs: self.max_finished_jobs,
            max_age: chrono::Duration::try_seconds(max_age_secs).unwrap_or(chrono::Duration::MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.server.max_upload_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.store.kind, StoreKind::Virtuoso);
        assert_eq!(config.store.graph_base, "http://localhost:8080/graph");
        assert_eq!(config.ingest.batch_size, 2000);
        assert_eq!(config.ingest.batch_delay_ms, 1000);
        assert_eq!(config.catalog_path, "references/class_definitions.json");
        assert!(config.worker_count > 0);
        assert_eq!(config.queue_capacity(), config.worker_count * 2);
    }

    #[test]
    fn test_retention_policy() {
        let retention = RetentionConfig {
            max_finished_jobs: 5,
            max_age_secs: 60,
        };
        let policy = retention.policy();
        assert_eq!(policy.max_finished_jobs, 5);
        assert_eq!(policy.max_age, chrono::Duration::seconds(60));
    }

    #[test]
    fn test_store_kind_wire_names() {
        let store: StoreConfig = serde_json::from_str(r#"{ "kind": "memory" }"#).unwrap();
        assert_eq!(store.kind, StoreKind::Memory);
        assert!(store.password.is_none());
    }
}
