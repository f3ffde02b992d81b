//! File system paths for the bridge.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory name under the home directory for bridge runtime files.
const BASE_DIR_NAME: &str = ".hev-tunnel";

/// Scratch location the engine can read on Android.
#[cfg(target_os = "android")]
const ANDROID_SCRATCH_DIR: &str = "/data/local/tmp";

/// Default directory for materialized inline configs.
///
/// `/data/local/tmp` on Android, the platform temp dir elsewhere.
pub fn default_scratch_dir() -> PathBuf {
    #[cfg(target_os = "android")]
    {
        PathBuf::from(ANDROID_SCRATCH_DIR)
    }
    #[cfg(not(target_os = "android"))]
    {
        std::env::temp_dir()
    }
}

/// Manages file system paths for the bridge.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.hev-tunnel)
    base_dir: PathBuf,
    /// Where inline configs are written before the engine reads them
    scratch_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.hev-tunnel`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
            scratch_dir: default_scratch_dir(),
        })
    }

    /// Resolve paths without failing: app sandboxes often have no home
    /// directory, so fall back to a base dir under the scratch location.
    pub fn resolve() -> Self {
        Self::new()
            .unwrap_or_else(|_| Self::with_base_dir(default_scratch_dir().join(BASE_DIR_NAME)))
    }

    /// Create a new Paths instance with a custom base directory.
    /// The scratch directory stays at the platform default.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            scratch_dir: default_scratch_dir(),
        }
    }

    /// Override the scratch directory.
    pub fn with_scratch_dir(mut self, scratch_dir: PathBuf) -> Self {
        self.scratch_dir = scratch_dir;
        self
    }

    /// Get the base directory (~/.hev-tunnel).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the scratch directory for inline configs.
    pub fn scratch_dir(&self) -> &PathBuf {
        &self.scratch_dir
    }

    /// Get the config file path (~/.hev-tunnel/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the logs directory (~/.hev-tunnel/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.hev-tunnel/logs/dev.jsonl).
    /// Only written with the `dev` feature; the log writer creates the directory.
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("dev.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_with_base_dir() {
        let base = PathBuf::from("/tmp/test-hev-tunnel");
        let paths = Paths::with_base_dir(base.clone());

        assert_eq!(paths.base_dir(), &base);
        assert_eq!(paths.config_file(), base.join("config.json"));
        assert_eq!(paths.logs_dir(), base.join("logs"));
        assert_eq!(paths.log_file(), base.join("logs/dev.jsonl"));
        assert_eq!(paths.scratch_dir(), &default_scratch_dir());
    }

    #[test]
    fn test_with_scratch_dir_overrides_default() {
        let paths = Paths::with_base_dir(PathBuf::from("/base"))
            .with_scratch_dir(PathBuf::from("/scratch"));
        assert_eq!(paths.scratch_dir(), &PathBuf::from("/scratch"));
        assert_eq!(paths.base_dir(), &PathBuf::from("/base"));
    }

    #[cfg(not(target_os = "android"))]
    #[test]
    fn test_default_scratch_dir_is_temp_dir() {
        assert_eq!(default_scratch_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_resolve_never_fails() {
        let paths = Paths::resolve();
        assert!(paths.base_dir().ends_with(BASE_DIR_NAME));
    }
}
