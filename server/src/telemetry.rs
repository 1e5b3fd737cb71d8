//! Logging setup.
//!
//! The library logs through `log`; those records are bridged into `tracing`
//! so they share the subscriber, filter and format with the pipeline spans.

use graphload::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

/// Filter directive: `RUST_LOG` when set, the configured level otherwise.
pub fn filter_directive(logging: &LoggingConfig) -> String {
    std::env::var("RUST_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| logging.level.clone())
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(logging: &LoggingConfig) {
    if tracing::dispatcher::has_been_set() {
        tracing::debug!("tracing subscriber already initialized, skipping");
        return;
    }

    let filter = EnvFilter::try_new(filter_directive(logging)).unwrap_or_else(|e| {
        eprintln!("Invalid log filter ({}), falling back to info", e);
        EnvFilter::new("info")
    });

    let fmt_layer = match logging.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
        LogFormat::Human => tracing_subscriber::fmt::layer().compact().boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return;
    }
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::warn!("log bridge not installed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_falls_back_to_config_level() {
        let logging = LoggingConfig {
            level: "graphload=debug".to_string(),
            format: LogFormat::Human,
        };
        if std::env::var("RUST_LOG").map_or(true, |v| v.trim().is_empty()) {
            assert_eq!(filter_directive(&logging), "graphload=debug");
        }
    }
}
