//! One engine invocation: materialize, run, clean up.

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tunnel_config_and_utils::{Config, Paths, DEFAULT_PROGRAM_NAME};

use crate::{
    materialize, AdapterError, AdapterResult, ConfigSource, Counters, Engine, EngineInvocation,
    ExitCode, TunFd,
};

/// Bridges a [`ConfigSource`] and a TUN descriptor into an [`Engine`] call.
#[derive(Debug)]
pub struct EngineAdapter<E> {
    engine: E,
    scratch_dir: PathBuf,
    program_name: String,
}

impl<E: Engine> EngineAdapter<E> {
    pub fn new(engine: E, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            scratch_dir: scratch_dir.into(),
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
        }
    }

    /// Build from runtime configuration.
    pub fn from_config(engine: E, config: &Config, paths: &Paths) -> Self {
        Self::new(engine, config.scratch_dir(paths)).with_program_name(&config.program_name)
    }

    pub fn with_program_name(mut self, program_name: impl Into<String>) -> Self {
        self.program_name = program_name.into();
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Run the engine once and block until it returns.
    ///
    /// Any scratch file written for an inline config is removed before this
    /// returns, whatever the outcome. The exit code is passed through as is.
    pub fn invoke(&self, source: &ConfigSource, tun_fd: TunFd) -> AdapterResult<ExitCode> {
        let handle = materialize(source, &self.scratch_dir).map_err(|e| {
            warn!(source = %source.describe(), error = %e, "config materialization failed");
            AdapterError::Materialize(e)
        })?;

        let invocation = EngineInvocation::new(&self.program_name, handle.path(), tun_fd)?;

        info!(
            config = %handle.path().display(),
            inline = handle.is_materialized(),
            fd = tun_fd,
            "starting tunnel engine"
        );
        let code = ExitCode::new(self.engine.run(&invocation));
        info!(code = code.code(), "tunnel engine exited");

        if let Err(e) = handle.cleanup() {
            warn!(error = %e, "failed to remove materialized config");
        }

        Ok(code)
    }

    /// Forward a quit request to the engine.
    pub fn request_quit(&self) {
        self.engine.request_quit();
    }

    pub fn read_counters(&self) -> Counters {
        self.engine.read_counters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::tests::{foreign_lock, stub_engine, take_observed};
    use crate::TUN_FD_ENV;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records what the engine saw, including the config file content at run time.
    #[derive(Default)]
    struct RecordingEngine {
        exit_code: i32,
        panic_on_run: bool,
        seen: Mutex<Vec<(Vec<String>, TunFd, Option<Vec<u8>>)>>,
    }

    impl RecordingEngine {
        fn exiting_with(exit_code: i32) -> Self {
            Self {
                exit_code,
                ..Default::default()
            }
        }

        fn seen(&self) -> Vec<(Vec<String>, TunFd, Option<Vec<u8>>)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Engine for RecordingEngine {
        fn run(&self, invocation: &EngineInvocation) -> i32 {
            let path = invocation.config_path().to_str().unwrap().to_string();
            let content = std::fs::read(&path).ok();
            self.seen
                .lock()
                .unwrap()
                .push((invocation.args_lossy(), invocation.tun_fd(), content));
            if self.panic_on_run {
                panic!("engine blew up");
            }
            self.exit_code
        }

        fn request_quit(&self) {}

        fn read_counters(&self) -> Counters {
            Counters::ZERO
        }
    }

    fn scratch() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn existing_path_is_passed_through() {
        let dir = scratch();
        let adapter = EngineAdapter::new(RecordingEngine::exiting_with(0), dir.path());

        let code = adapter
            .invoke(&ConfigSource::path("/etc/hev/tunnel.yml"), 9)
            .unwrap();

        assert!(code.is_clean());
        let seen = adapter.engine().seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, vec!["hev-socks5-tunnel", "-c", "/etc/hev/tunnel.yml"]);
        assert_eq!(seen[0].1, 9);
        assert!(is_empty_dir(dir.path()));
    }

    #[test]
    fn inline_config_is_readable_during_run_and_removed_after() {
        let dir = scratch();
        let adapter = EngineAdapter::new(RecordingEngine::exiting_with(0), dir.path());
        let text = "tunnel:\n  mtu: 8500\nmisc:\n  note: \"größe ✓\"\n";

        adapter.invoke(&ConfigSource::inline(text), 4).unwrap();

        let seen = adapter.engine().seen();
        assert_eq!(seen[0].2.as_deref(), Some(text.as_bytes()));
        assert!(seen[0].0[2].starts_with(dir.path().to_str().unwrap()));
        assert!(is_empty_dir(dir.path()));
    }

    #[test]
    fn engine_fault_code_is_passed_through_and_file_removed() {
        let dir = scratch();
        let adapter = EngineAdapter::new(RecordingEngine::exiting_with(-1), dir.path());

        let code = adapter.invoke(&ConfigSource::inline("a: 1"), 4).unwrap();

        assert_eq!(code.code(), -1);
        assert!(is_empty_dir(dir.path()));
    }

    #[test]
    fn panicking_engine_still_removes_file() {
        let dir = scratch();
        let adapter = EngineAdapter::new(
            RecordingEngine {
                panic_on_run: true,
                ..Default::default()
            },
            dir.path(),
        );

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            adapter.invoke(&ConfigSource::inline("a: 1"), 4)
        }));

        assert!(result.is_err());
        assert!(is_empty_dir(dir.path()));
    }

    #[test]
    fn materialization_failure_never_reaches_engine() {
        let dir = scratch();
        let adapter = EngineAdapter::new(RecordingEngine::default(), dir.path().join("missing"));

        let result = adapter.invoke(&ConfigSource::inline("a: 1"), 4);

        assert!(matches!(result, Err(AdapterError::Materialize(_))));
        assert!(adapter.engine().seen().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unusable_path_never_reaches_engine() {
        let dir = scratch();
        let adapter = EngineAdapter::new(RecordingEngine::default(), dir.path());

        let result = adapter.invoke(&ConfigSource::path("/tmp/bad\0name"), 4);

        assert!(matches!(result, Err(AdapterError::InvalidPath(_))));
        assert!(adapter.engine().seen().is_empty());
    }

    #[test]
    fn from_config_uses_program_name_and_scratch_dir() {
        let dir = scratch();
        let paths = Paths::with_base_dir(dir.path().to_path_buf())
            .with_scratch_dir(dir.path().to_path_buf());
        let config = Config {
            program_name: "tunnel".to_string(),
            ..Config::default()
        };
        let adapter = EngineAdapter::from_config(RecordingEngine::default(), &config, &paths);

        adapter.invoke(&ConfigSource::path("/x.yml"), 1).unwrap();

        assert_eq!(adapter.scratch_dir(), dir.path());
        assert_eq!(adapter.engine().seen()[0].0[0], "tunnel");
    }

    #[test]
    fn foreign_engine_sees_exact_descriptor_text() {
        let _lock = foreign_lock();
        let dir = scratch();
        let adapter = EngineAdapter::new(stub_engine(), dir.path());

        let code = adapter.invoke(&ConfigSource::inline("a: 1"), 2048).unwrap();
        let observed = take_observed().unwrap();

        assert_eq!(code.code(), 7);
        assert_eq!(observed.fd_env.as_deref(), Some("2048"));
        assert_eq!(observed.args[1], "-c");
        assert!(std::env::var(TUN_FD_ENV).is_err());
        assert!(is_empty_dir(dir.path()));
    }
}
