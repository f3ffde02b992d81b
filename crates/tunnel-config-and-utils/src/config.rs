//! Runtime configuration for the bridge.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `argv[0]` handed to the engine.
pub const DEFAULT_PROGRAM_NAME: &str = "hev-socks5-tunnel";

/// Env var overriding the log level.
const LOG_LEVEL_ENV: &str = "HEV_TUNNEL_LOG_LEVEL";
/// Env var overriding the scratch directory.
const SCRATCH_DIR_ENV: &str = "HEV_TUNNEL_SCRATCH_DIR";

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for materialized inline configs. `None` uses the path default.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    /// Program name passed as the first engine argument.
    #[serde(default = "default_program_name")]
    pub program_name: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_program_name() -> String {
    DEFAULT_PROGRAM_NAME.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            scratch_dir: None,
            program_name: default_program_name(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file if present, falling back to
    /// defaults, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Scratch directory to use: the configured one, else the path default.
    pub fn scratch_dir(&self, paths: &Paths) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| paths.scratch_dir().clone())
    }

    fn load_from_env(&mut self) {
        if let Some(level) = non_empty_env(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
        if let Some(dir) = non_empty_env(SCRATCH_DIR_ENV) {
            self.scratch_dir = Some(PathBuf::from(dir));
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use tempfile::tempdir;

    fn env_lock() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_env() {
        std::env::remove_var(LOG_LEVEL_ENV);
        std::env::remove_var(SCRATCH_DIR_ENV);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.program_name, DEFAULT_PROGRAM_NAME);
        assert!(config.scratch_dir.is_none());
    }

    #[test]
    fn test_config_load_from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "log_level": "debug" }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.program_name, DEFAULT_PROGRAM_NAME);
        assert!(config.scratch_dir.is_none());
    }

    #[test]
    fn test_config_load_from_file_rejects_bad_json() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json").unwrap();

        assert!(matches!(
            Config::load_from_file(&config_path),
            Err(crate::CoreError::Json(_))
        ));
    }

    #[test]
    fn test_config_load_reads_config_file() {
        let _guard = env_lock();
        clear_env();
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            log_level: "trace".to_string(),
            scratch_dir: Some(dir.path().join("scratch")),
            program_name: "tunnel".to_string(),
        };
        std::fs::write(
            paths.config_file(),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_file_log_level_reaches_logging() {
        let _guard = env_lock();
        clear_env();
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        std::fs::write(paths.config_file(), r#"{ "log_level": "debug" }"#).unwrap();

        let config = Config::load(&paths).unwrap();
        let log_config = crate::logging::log_config(&paths, &config.log_level);

        assert_eq!(log_config.default_level, "debug");
        assert_eq!(log_config.log_path, Some(paths.log_file()));
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let _guard = env_lock();
        clear_env();
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = env_lock();
        std::env::set_var(LOG_LEVEL_ENV, "warn");
        std::env::set_var(SCRATCH_DIR_ENV, "/var/scratch");

        let config = Config::new();
        clear_env();

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.scratch_dir, Some(PathBuf::from("/var/scratch")));
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let _guard = env_lock();
        std::env::set_var(LOG_LEVEL_ENV, "   ");

        let config = Config::new();
        clear_env();

        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_scratch_dir_resolution() {
        let paths = Paths::with_base_dir(PathBuf::from("/base"))
            .with_scratch_dir(PathBuf::from("/paths-scratch"));

        let mut config = Config::default();
        assert_eq!(config.scratch_dir(&paths), PathBuf::from("/paths-scratch"));

        config.scratch_dir = Some(PathBuf::from("/config-scratch"));
        assert_eq!(config.scratch_dir(&paths), PathBuf::from("/config-scratch"));
    }
}
