pub mod loader;
pub mod schema;

pub use loader::{
    apply_env_overrides, load_config, load_config_from_str, load_config_or_default,
    resolve_store_password, validate_config,
};
pub use schema::{
    Config, IngestConfig, LogFormat, LoggingConfig, RetentionConfig, ServerConfig, StoreConfig,
    StoreKind,
};
