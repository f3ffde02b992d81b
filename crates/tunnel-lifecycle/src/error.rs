//! Errors from lifecycle management.

use engine_adapter::AdapterError;
use thiserror::Error;

/// Why a start request did not produce an engine exit code.
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Tunnel is already running")]
    AlreadyRunning,

    #[error("Failed to write config to scratch file: {0}")]
    ConfigMaterialization(#[source] std::io::Error),

    #[error("Failed to extract config: {0}")]
    ConfigExtraction(String),

    /// The engine ran and returned a nonzero status.
    #[error("Engine exited with code {0}")]
    EngineFault(i32),

    #[error("Invalid TUN file descriptor: {0}")]
    InvalidDescriptor(i32),
}

impl From<AdapterError> for TunnelError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Materialize(e) => TunnelError::ConfigMaterialization(e),
            AdapterError::InvalidPath(reason) => TunnelError::ConfigExtraction(reason),
        }
    }
}
