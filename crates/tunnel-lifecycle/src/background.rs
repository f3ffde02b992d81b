//! Running the blocking start on a dedicated thread.
//!
//! [`TunnelLifecycle::stop`] never waits. Callers that need to know the engine
//! has actually returned use [`BackgroundTunnel::stop_and_wait`], which bounds
//! the wait and reports a timeout instead of hanging.

use engine_adapter::{ConfigSource, Engine, ExitCode, TunFd};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::{TunnelError, TunnelLifecycle};

/// Name of the thread that runs the engine.
pub const THREAD_NAME: &str = "HevSocks5Tunnel";

/// How long `start` waits before declaring the tunnel up.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(100);

/// Default bound for [`BackgroundTunnel::stop_and_wait`].
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum BackgroundError {
    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    /// The engine returned before the startup grace period elapsed.
    #[error("Tunnel failed to start: engine exited with code {0}")]
    StartupFailed(ExitCode),

    #[error("Tunnel thread did not stop within {0:?}")]
    StopTimedOut(Duration),

    #[error("Failed to spawn tunnel thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Tunnel thread panicked")]
    WorkerPanicked,

    #[error("Tunnel was not started")]
    NotStarted,
}

type Worker = JoinHandle<Result<ExitCode, TunnelError>>;

/// Owns the thread of one background run.
pub struct BackgroundTunnel<E: Engine + 'static> {
    lifecycle: Arc<TunnelLifecycle<E>>,
    worker: Option<Worker>,
    startup_grace: Duration,
}

impl<E: Engine + 'static> BackgroundTunnel<E> {
    pub fn new(lifecycle: Arc<TunnelLifecycle<E>>) -> Self {
        Self {
            lifecycle,
            worker: None,
            startup_grace: DEFAULT_STARTUP_GRACE,
        }
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub fn lifecycle(&self) -> &Arc<TunnelLifecycle<E>> {
        &self.lifecycle
    }

    /// Start the tunnel on its own thread and return once it is up.
    ///
    /// The tunnel counts as up when the run is still live after the startup
    /// grace period. A run that ended earlier is reported as an error and
    /// its thread is joined.
    ///
    /// A run that fails after the grace period, such as a slow config write
    /// that errors or an engine that exits late, still reports `Ok` here.
    /// Its outcome comes back from [`stop_and_wait`](Self::stop_and_wait).
    pub fn start(&mut self, config: ConfigSource, tun_fd: TunFd) -> Result<(), BackgroundError> {
        if self.lifecycle.is_running() {
            return Err(TunnelError::AlreadyRunning.into());
        }
        if tun_fd < 0 {
            return Err(TunnelError::InvalidDescriptor(tun_fd).into());
        }
        self.reap_finished();

        let lifecycle = self.lifecycle.clone();
        let worker = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || lifecycle.start(config, tun_fd))
            .map_err(BackgroundError::Spawn)?;

        thread::sleep(self.startup_grace);

        if worker.is_finished() {
            let outcome = join(worker)?;
            warn!(code = outcome.code(), "tunnel exited during startup");
            return Err(BackgroundError::StartupFailed(outcome));
        }

        info!(thread = THREAD_NAME, fd = tun_fd, "tunnel running in background");
        self.worker = Some(worker);
        Ok(())
    }

    /// Signal quit without waiting.
    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    /// Signal quit and wait up to [`DEFAULT_STOP_TIMEOUT`] for the engine to return.
    pub fn stop_and_wait_default(&mut self) -> Result<ExitCode, BackgroundError> {
        self.stop_and_wait(DEFAULT_STOP_TIMEOUT)
    }

    /// Signal quit and wait up to `timeout` for the engine to return.
    ///
    /// On timeout the thread is left detached; the lifecycle stays running
    /// until the engine eventually returns.
    pub fn stop_and_wait(&mut self, timeout: Duration) -> Result<ExitCode, BackgroundError> {
        let worker = self.worker.take().ok_or(BackgroundError::NotStarted)?;
        self.lifecycle.stop();

        let deadline = Instant::now() + timeout;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                warn!(?timeout, "tunnel thread did not stop in time");
                return Err(BackgroundError::StopTimedOut(timeout));
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        let code = join(worker)?;
        info!(code = code.code(), "background tunnel stopped");
        Ok(code)
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    fn reap_finished(&mut self) {
        if self.worker.as_ref().is_some_and(|w| w.is_finished()) {
            if let Some(worker) = self.worker.take() {
                if let Err(e) = join(worker) {
                    warn!(error = %e, "previous tunnel run ended with an error");
                }
            }
        }
    }
}

fn join(worker: Worker) -> Result<ExitCode, BackgroundError> {
    match worker.join() {
        Ok(result) => Ok(result?),
        Err(_) => Err(BackgroundError::WorkerPanicked),
    }
}
