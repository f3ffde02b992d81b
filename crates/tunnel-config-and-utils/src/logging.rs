//! Logging initialization for the bridge.
//!
//! Thin wrappers over the observability crate so the boundary layer does not
//! need to know how subscribers are built.

use crate::{Config, Paths};
use observability::LogConfig;

const DEFAULT_SERVICE_NAME: &str = "hev-tunnel";

/// Initialize logging at the level from `config`.
pub fn init_logging_from_config(config: &Config, paths: &Paths) -> bool {
    init_logging(paths, &config.log_level)
}

/// Initialize logging at `level`, with the dev log file under `paths`.
///
/// Log level comes from `RUST_LOG` when set, else `level`. Safe to call more
/// than once; returns `true` only for the call that installed the subscriber.
pub fn init_logging(paths: &Paths, level: &str) -> bool {
    observability::init_with_config(log_config(paths, level))
}

pub(crate) fn log_config(paths: &Paths, level: &str) -> LogConfig {
    LogConfig {
        service_name: DEFAULT_SERVICE_NAME.into(),
        default_level: parse_level(level).to_string().to_lowercase(),
        log_path: Some(paths.log_file()),
        also_stderr: true,
    }
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
