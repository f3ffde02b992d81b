//! Engine adapter for the hev-socks5-tunnel bridge.
//!
//! Turns a [`ConfigSource`] and a TUN descriptor into the engine's
//! process-style invocation (`argv` plus the descriptor), runs the blocking
//! entry point, and removes any config file it had to write.

mod adapter;
mod engine;
mod error;
pub mod foreign;
mod materialize;
mod source;

pub use adapter::EngineAdapter;
pub use engine::{Counters, Engine, EngineInvocation, ExitCode, TunFd};
pub use error::{AdapterError, AdapterResult};
pub use foreign::{EngineEntryPoints, ForeignEngine, TUN_FD_ENV};
pub use materialize::{materialize, ConfigPathHandle, SCRATCH_FILE_PREFIX};
pub use source::ConfigSource;
