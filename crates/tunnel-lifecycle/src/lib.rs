//! Tunnel lifecycle management for the hev-socks5-tunnel bridge.
//!
//! Enforces a single running tunnel per [`TunnelLifecycle`], forwards stop
//! requests, and reports counters only while the engine is live.

mod background;
mod error;
mod lifecycle;

pub use background::{
    BackgroundError, BackgroundTunnel, DEFAULT_STARTUP_GRACE, DEFAULT_STOP_TIMEOUT, THREAD_NAME,
};
pub use error::TunnelError;
pub use lifecycle::{RunState, TunnelLifecycle};

pub use engine_adapter::{ConfigSource, Counters, Engine, EngineAdapter, ExitCode, TunFd};
