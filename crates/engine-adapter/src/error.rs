//! Error types for the engine adapter.

use thiserror::Error;

/// Failures that stop an invocation before the engine is called.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Writing the inline config to the scratch directory failed.
    #[error("Failed to materialize config: {0}")]
    Materialize(#[source] std::io::Error),

    /// The config path cannot be passed as a C string.
    #[error("Config path is not usable by the engine: {0}")]
    InvalidPath(String),
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
