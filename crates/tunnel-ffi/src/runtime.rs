//! The process-wide lifecycle behind the exported functions.

use engine_adapter::Engine;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{info, warn};
use tunnel_config_and_utils::{init_logging_from_config, Config, Paths};
use tunnel_lifecycle::TunnelLifecycle;

use crate::error::LayerError;

/// Engine type used by the exported lifecycle.
pub type SharedEngine = Arc<dyn Engine>;

static LIFECYCLE: OnceCell<TunnelLifecycle<SharedEngine>> = OnceCell::new();
static SETTINGS: OnceCell<RuntimeSettings> = OnceCell::new();

/// Paths and config file contents, read once per process.
#[derive(Debug)]
pub(crate) struct RuntimeSettings {
    pub paths: Paths,
    pub config: Config,
}

impl RuntimeSettings {
    fn load(paths: Paths) -> Self {
        let config = Config::load(&paths).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load config, using defaults");
            Config::new()
        });
        Self { paths, config }
    }
}

pub(crate) fn settings() -> &'static RuntimeSettings {
    SETTINGS.get_or_init(|| RuntimeSettings::load(Paths::resolve()))
}

/// Install logging at the configured level. Returns true if this call installed it.
pub(crate) fn init_logging() -> bool {
    let settings = settings();
    init_logging_from_config(&settings.config, &settings.paths)
}

/// Install the process-wide lifecycle. Returns false if one already exists.
pub fn install(lifecycle: TunnelLifecycle<SharedEngine>) -> bool {
    let installed = LIFECYCLE.set(lifecycle).is_ok();
    if !installed {
        warn!("tunnel lifecycle already installed");
    }
    installed
}

/// Install `engine` with the runtime configuration from disk and environment.
pub fn install_engine(engine: SharedEngine) -> bool {
    install(build_lifecycle(engine))
}

fn build_lifecycle(engine: SharedEngine) -> TunnelLifecycle<SharedEngine> {
    let RuntimeSettings { paths, config } = settings();
    info!(
        scratch_dir = %config.scratch_dir(paths).display(),
        program = %config.program_name,
        "creating tunnel lifecycle"
    );
    TunnelLifecycle::from_config(engine, config, paths)
}

#[cfg(feature = "link-hev")]
pub(crate) fn lifecycle() -> Result<&'static TunnelLifecycle<SharedEngine>, LayerError> {
    use engine_adapter::ForeignEngine;

    Ok(LIFECYCLE.get_or_init(|| build_lifecycle(Arc::new(ForeignEngine::hev()))))
}

#[cfg(not(feature = "link-hev"))]
pub(crate) fn lifecycle() -> Result<&'static TunnelLifecycle<SharedEngine>, LayerError> {
    LIFECYCLE.get().ok_or_else(LayerError::not_initialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn settings_read_the_config_file() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        std::fs::write(
            paths.config_file(),
            r#"{ "log_level": "trace", "program_name": "tun2socks" }"#,
        )
        .unwrap();

        let settings = RuntimeSettings::load(paths);

        assert_eq!(settings.config.program_name, "tun2socks");
        assert_eq!(settings.config.log_level, "trace");
    }

    #[test]
    fn unreadable_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        std::fs::write(paths.config_file(), "{ not json").unwrap();

        let settings = RuntimeSettings::load(paths);

        assert_eq!(settings.config.program_name, Config::new().program_name);
    }
}
