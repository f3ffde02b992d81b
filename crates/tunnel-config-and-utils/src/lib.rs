//! Core configuration and utilities for the hev-socks5-tunnel bridge.

mod config;
mod error;
mod format;
mod logging;
mod paths;
pub mod settings;

pub use config::{Config, DEFAULT_LOG_LEVEL, DEFAULT_PROGRAM_NAME};
pub use error::{CoreError, CoreResult};
pub use format::format_bytes;
pub use logging::{init_logging, init_logging_from_config, parse_level};
pub use paths::{default_scratch_dir, Paths};
pub use settings::{TunnelSettings, TunnelSettingsBuilder};
