//! Foreign-function boundary for the hev-socks5-tunnel bridge.
//!
//! One [`TunnelLifecycle`](tunnel_lifecycle::TunnelLifecycle) per process,
//! reachable through `hev_tunnel_*` C functions and, with the `jni` feature,
//! through the native methods of `cc.hev.socks5.tunnel.HevSocks5Tunnel`.
//!
//! # Safety
//! Callers must pass valid NUL-terminated strings and, for
//! `hev_tunnel_get_stats`, a buffer of four `u64`. Strings returned by this
//! library must be released with `hev_tunnel_free_string`.

mod c_api;
mod error;
#[cfg(feature = "jni")]
mod jni_bridge;
mod runtime;

pub use c_api::*;
pub use error::{LayerError, LayerErrorCode, REJECTED};
pub use runtime::{install, install_engine, SharedEngine};
