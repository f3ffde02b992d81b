//! # Observability
//!
//! Centralized tracing setup for the tunnel bridge.
//!
//! Crates in this workspace are **log producers**: they use standard `tracing`
//! macros and never touch subscribers. The host-facing layer calls
//! [`init_with_config`] once, usually from the library load hook.
//!
//! A shared library can be loaded, unloaded and loaded again by the same host
//! process, so initialization never panics when a global subscriber is
//! already installed. The second call simply reports `false`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "hev-tunnel".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("bridge loaded");
//! ```

#[cfg(feature = "dev")]
mod dev;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "hev-tunnel", "tunnel-ffi").
    /// Attached to the startup record for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.hev-tunnel/logs/dev.jsonl` with the `dev` feature.
    pub log_path: Option<PathBuf>,

    /// Emit logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

/// Initialize the observability layer with default settings.
///
/// Returns `true` when this call installed the global subscriber.
pub fn init(service_name: &str) -> bool {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize the observability layer with custom configuration.
///
/// Returns `true` when this call installed the global subscriber and `false`
/// when one was already present (installed by us or by the host).
pub fn init_with_config(config: LogConfig) -> bool {
    if INITIALIZED.load(Ordering::SeqCst) {
        return false;
    }

    // Only a successful install latches; a config that installs nothing
    // leaves the next call free to try.
    let installed = install_subscriber(&config);
    if installed {
        INITIALIZED.store(true, Ordering::SeqCst);
    }
    installed
}

#[cfg(feature = "dev")]
fn install_subscriber(config: &LogConfig) -> bool {
    dev::init_dev_subscriber(config)
}

#[cfg(not(feature = "dev"))]
fn install_subscriber(config: &LogConfig) -> bool {
    if !config.also_stderr {
        return false;
    }

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.default_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = %config.service_name, "observability initialized");
    }
    installed
}

/// Build an env filter from RUST_LOG, falling back to the given level.
pub(crate) fn env_filter(default_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
/// Crates can use `observability::info!()` or `tracing::info!()`.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
