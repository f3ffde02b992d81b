//! The single-instance guard around the blocking engine call.

use engine_adapter::{ConfigSource, Counters, Engine, EngineAdapter, ExitCode, TunFd};
use parking_lot::Mutex;
use std::fmt;
use tracing::{debug, info, warn};
use tunnel_config_and_utils::{Config, Paths};

use crate::TunnelError;

/// Whether an engine call is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
        }
    }
}

/// Admits at most one engine run at a time.
///
/// `start` blocks its caller for the life of the tunnel. `stop`, `get_stats`
/// and `is_running` may be called from other threads meanwhile.
pub struct TunnelLifecycle<E> {
    adapter: EngineAdapter<E>,
    state: Mutex<RunState>,
}

impl<E: Engine> TunnelLifecycle<E> {
    pub fn new(adapter: EngineAdapter<E>) -> Self {
        Self {
            adapter,
            state: Mutex::new(RunState::Idle),
        }
    }

    /// Build around `engine` with the scratch dir and program name from `config`.
    pub fn from_config(engine: E, config: &Config, paths: &Paths) -> Self {
        Self::new(EngineAdapter::from_config(engine, config, paths))
    }

    pub fn adapter(&self) -> &EngineAdapter<E> {
        &self.adapter
    }

    /// Run the tunnel until the engine returns.
    ///
    /// Returns the engine's exit code as is. A start while another run is
    /// live fails with [`TunnelError::AlreadyRunning`] at once, without
    /// writing a scratch file or touching the environment.
    pub fn start(&self, config: ConfigSource, tun_fd: TunFd) -> Result<ExitCode, TunnelError> {
        if tun_fd < 0 {
            warn!(fd = tun_fd, "rejecting start with invalid TUN descriptor");
            return Err(TunnelError::InvalidDescriptor(tun_fd));
        }

        let _running = self.enter()?;
        info!(config = %config.describe(), fd = tun_fd, "tunnel starting");

        let code = self.adapter.invoke(&config, tun_fd).map_err(|e| {
            warn!(error = %e, "tunnel start failed before reaching the engine");
            TunnelError::from(e)
        })?;

        if code.is_clean() {
            info!(code = code.code(), "tunnel stopped");
        } else {
            warn!(code = code.code(), "tunnel engine exited with an error");
        }
        Ok(code)
    }

    /// Like [`start`](Self::start) but treats a nonzero exit code as
    /// [`TunnelError::EngineFault`].
    pub fn start_and_check(&self, config: ConfigSource, tun_fd: TunFd) -> Result<(), TunnelError> {
        let code = self.start(config, tun_fd)?;
        if code.is_clean() {
            Ok(())
        } else {
            Err(TunnelError::EngineFault(code.code()))
        }
    }

    /// Ask the engine to quit. Does not wait, and is harmless when idle.
    pub fn stop(&self) {
        info!("requesting tunnel stop");
        self.adapter.request_quit();
    }

    /// Live counters while running, all zero while idle.
    pub fn get_stats(&self) -> Counters {
        let state = self.state.lock();
        match *state {
            RunState::Idle => Counters::ZERO,
            RunState::Running => self.adapter.read_counters(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    fn enter(&self) -> Result<RunningGuard<'_>, TunnelError> {
        let mut state = self.state.lock();
        if *state == RunState::Running {
            warn!("tunnel is already running");
            return Err(TunnelError::AlreadyRunning);
        }
        *state = RunState::Running;
        debug!("run state: idle -> running");
        Ok(RunningGuard { state: &self.state })
    }
}

impl<E> fmt::Debug for TunnelLifecycle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelLifecycle")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

/// Puts the state back to idle when the start call ends, however it ends.
struct RunningGuard<'a> {
    state: &'a Mutex<RunState>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = RunState::Idle;
        debug!("run state: running -> idle");
    }
}
