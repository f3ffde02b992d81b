//! The engine contract and the values that cross it.

use std::ffi::CString;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tunnel_config_and_utils::format_bytes;

use crate::{AdapterError, AdapterResult};

/// Numeric TUN descriptor as the host passes it.
pub type TunFd = std::os::raw::c_int;

/// A blocking tunnel engine.
///
/// `run` does not return until the engine's event loop exits, either because
/// `request_quit` was called from another thread or because of a fault.
/// `request_quit` and `read_counters` must be callable concurrently with a
/// blocked `run`.
pub trait Engine: Send + Sync {
    /// Run the engine to completion and return its exit status.
    fn run(&self, invocation: &EngineInvocation) -> i32;

    /// Ask a running engine to stop. Must be harmless when nothing runs.
    fn request_quit(&self);

    /// Read the live traffic counters.
    fn read_counters(&self) -> Counters;
}

impl<E: Engine + ?Sized> Engine for Arc<E> {
    fn run(&self, invocation: &EngineInvocation) -> i32 {
        (**self).run(invocation)
    }

    fn request_quit(&self) {
        (**self).request_quit()
    }

    fn read_counters(&self) -> Counters {
        (**self).read_counters()
    }
}

/// Everything one engine run needs: `argv` and the TUN descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    args: Vec<CString>,
    tun_fd: TunFd,
}

impl EngineInvocation {
    /// Build `[program_name, "-c", config_path]`.
    pub fn new(program_name: &str, config_path: &Path, tun_fd: TunFd) -> AdapterResult<Self> {
        let program = CString::new(program_name)
            .map_err(|_| AdapterError::InvalidPath("program name contains NUL".to_string()))?;
        let flag = CString::new("-c")
            .map_err(|_| AdapterError::InvalidPath("flag contains NUL".to_string()))?;
        let path = path_to_cstring(config_path)?;

        Ok(Self {
            args: vec![program, flag, path],
            tun_fd,
        })
    }

    pub fn args(&self) -> &[CString] {
        &self.args
    }

    /// Arguments as lossy UTF-8, for logs and assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// The config path argument.
    pub fn config_path(&self) -> &CString {
        &self.args[2]
    }

    pub fn tun_fd(&self) -> TunFd {
        self.tun_fd
    }
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> AdapterResult<CString> {
    use std::os::unix::ffi::OsStrExt;

    CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        AdapterError::InvalidPath(format!("{} contains an interior NUL", path.display()))
    })
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> AdapterResult<CString> {
    let utf8 = path
        .to_str()
        .ok_or_else(|| AdapterError::InvalidPath(format!("{} is not UTF-8", path.display())))?;
    CString::new(utf8).map_err(|_| {
        AdapterError::InvalidPath(format!("{} contains an interior NUL", path.display()))
    })
}

/// Exit status returned by the engine, passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const CLEAN: ExitCode = ExitCode(0);

    pub fn new(code: i32) -> Self {
        Self(code)
    }

    pub fn code(self) -> i32 {
        self.0
    }

    /// Zero means the engine shut down because it was asked to.
    pub fn is_clean(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traffic counters of one engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
}

impl Counters {
    pub const ZERO: Counters = Counters {
        tx_packets: 0,
        tx_bytes: 0,
        rx_packets: 0,
        rx_bytes: 0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Host ordering: `[tx_bytes, rx_bytes, tx_packets, rx_packets]`.
    pub fn to_host_array(&self) -> [u64; 4] {
        [self.tx_bytes, self.rx_bytes, self.tx_packets, self.rx_packets]
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TunnelStats{{tx={} ({} packets), rx={} ({} packets)}}",
            format_bytes(self.tx_bytes),
            self.tx_packets,
            format_bytes(self.rx_bytes),
            self.rx_packets
        )
    }
}
