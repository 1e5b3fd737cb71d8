use std::path::{Path, PathBuf};

use log::info;
use secrecy::SecretString;

use crate::config::schema::{Config, StoreConfig};
use crate::error::ConfigError;
use crate::secrets::resolve_secret_optional;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Config file used when neither a path nor `GRAPHLOAD_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "graphload.json";

pub const ENV_CONFIG_PATH: &str = "GRAPHLOAD_CONFIG";
pub const ENV_STORE_URL: &str = "VIRTUOSO_URL";
pub const ENV_BIND: &str = "GRAPHLOAD_BIND";

/// Password of a stock Virtuoso install, used when no source is configured.
const DEFAULT_STORE_PASSWORD: &str = "dba";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the config from `path`, `$GRAPHLOAD_CONFIG` or `graphload.json`, in
/// that order. A missing default file yields the built-in defaults; an
/// explicitly named file must exist. Environment overrides are applied last.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    let explicit = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from));

    let mut config = match explicit {
        Some(path) => {
            info!("Loading config from {}", path.display());
            load_config(&path)?
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!("Loading config from {}", DEFAULT_CONFIG_FILE);
            load_config(DEFAULT_CONFIG_FILE)?
        }
        None => {
            info!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Overrides the store URL and bind address from the environment.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(url) = non_empty_env(ENV_STORE_URL) {
        info!("Store URL overridden by {}", ENV_STORE_URL);
        config.store.url = url;
    }
    if let Some(bind) = non_empty_env(ENV_BIND) {
        config.server.bind = bind;
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolves the store password from the inline value, file or env var,
/// falling back to `dba` only when none of them is set.
pub fn resolve_store_password(store: &StoreConfig) -> Result<SecretString, ConfigError> {
    let resolved = resolve_secret_optional(
        store.password.as_deref(),
        store.password_file.as_deref(),
        store.password_env_var.as_deref(),
    )?;
    Ok(resolved.unwrap_or_else(|| SecretString::from(DEFAULT_STORE_PASSWORD.to_string())))
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Validation { message });

    if config.version != "1.0" {
        return invalid(format!("Unsupported config version: {}", config.version));
    }
    if config.worker_count == 0 {
        return invalid("worker_count must be at least 1".to_string());
    }
    if config.queue_capacity == Some(0) {
        return invalid("queue_capacity must be at least 1".to_string());
    }
    if config.ingest.batch_size == 0 {
        return invalid("ingest.batch_size must be at least 1".to_string());
    }
    if config.retention.max_finished_jobs == 0 {
        return invalid("retention.max_finished_jobs must be at least 1".to_string());
    }
    if config.server.max_upload_bytes == 0 {
        return invalid("server.max_upload_bytes must be at least 1".to_string());
    }
    if !(config.store.url.starts_with("http://") || config.store.url.starts_with("https://")) {
        return invalid(format!(
            "store.url must be an http(s) URL: {}",
            crate::sanitize::redact_url(&config.store.url)
        ));
    }

    // The graph IRI of a tenant is `{graph_base}/{tenant}`; check with a sample tenant.
    let sample_graph = format!("{}/tenant", config.store.graph_base.trim_end_matches('/'));
    if let Err(e) = oxrdf::NamedNode::new(&sample_graph) {
        return invalid(format!(
            "store.graph_base is not a valid IRI prefix ({}): {}",
            config.store.graph_base, e
        ));
    }

    Ok(())
}
