//! Thin wrapper around the engine's C entry points.
//!
//! This is the only place that touches the process environment: the engine
//! reads the TUN descriptor from [`TUN_FD_ENV`], so the variable is written
//! right before the blocking main call and removed when it returns.

use std::os::raw::{c_char, c_int};
use std::ptr;
use tracing::{debug, trace};

use crate::{Counters, Engine, EngineInvocation};

/// Environment variable the engine reads the TUN descriptor from.
pub const TUN_FD_ENV: &str = "HEV_SOCKS5_TUNNEL_TUN_FD";

/// `int main(int argc, char **argv)`, blocking.
pub type MainFn = unsafe extern "C" fn(argc: c_int, argv: *mut *mut c_char) -> c_int;
/// `void quit(void)`, async and idempotent.
pub type QuitFn = unsafe extern "C" fn();
/// `void stats(size_t *tx_packets, size_t *tx_bytes, size_t *rx_packets, size_t *rx_bytes)`.
pub type StatsFn = unsafe extern "C" fn(
    tx_packets: *mut usize,
    tx_bytes: *mut usize,
    rx_packets: *mut usize,
    rx_bytes: *mut usize,
);

/// The engine's three C entry points.
#[derive(Clone, Copy)]
pub struct EngineEntryPoints {
    pub main: MainFn,
    pub quit: QuitFn,
    pub stats: StatsFn,
}

impl std::fmt::Debug for EngineEntryPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineEntryPoints")
            .field("main", &(self.main as *const ()))
            .field("quit", &(self.quit as *const ()))
            .field("stats", &(self.stats as *const ()))
            .finish()
    }
}

#[cfg(feature = "link-hev")]
mod hev {
    use std::os::raw::{c_char, c_int};

    #[link(name = "hev-socks5-tunnel")]
    extern "C" {
        pub fn hev_socks5_tunnel_main(argc: c_int, argv: *mut *mut c_char) -> c_int;
        pub fn hev_socks5_tunnel_quit();
        pub fn hev_socks5_tunnel_stats(
            tx_packets: *mut usize,
            tx_bytes: *mut usize,
            rx_packets: *mut usize,
            rx_bytes: *mut usize,
        );
    }
}

#[cfg(feature = "link-hev")]
impl EngineEntryPoints {
    /// The linked hev-socks5-tunnel library.
    pub fn hev() -> Self {
        Self {
            main: hev::hev_socks5_tunnel_main,
            quit: hev::hev_socks5_tunnel_quit,
            stats: hev::hev_socks5_tunnel_stats,
        }
    }
}

/// [`Engine`] implementation that calls foreign entry points.
#[derive(Debug, Clone, Copy)]
pub struct ForeignEngine {
    entry: EngineEntryPoints,
}

impl ForeignEngine {
    /// Wrap raw entry points.
    ///
    /// # Safety
    ///
    /// The functions must honor the engine contract: `main` reads at most
    /// `argc` NUL-terminated strings from a NULL-terminated `argv` and does not
    /// keep them after returning, `quit` is safe to call from any thread at
    /// any time, and `stats` writes exactly the four pointed-to counters.
    pub unsafe fn from_entry_points(entry: EngineEntryPoints) -> Self {
        Self { entry }
    }

    /// The linked hev-socks5-tunnel library.
    #[cfg(feature = "link-hev")]
    pub fn hev() -> Self {
        // SAFETY: the hev symbols implement the contract documented above.
        unsafe { Self::from_entry_points(EngineEntryPoints::hev()) }
    }
}

/// Removes the descriptor variable when the engine call ends, including by unwinding.
struct FdEnvGuard;

impl FdEnvGuard {
    fn export(tun_fd: c_int) -> Self {
        std::env::set_var(TUN_FD_ENV, tun_fd.to_string());
        trace!(var = TUN_FD_ENV, fd = tun_fd, "exported TUN descriptor");
        FdEnvGuard
    }
}

impl Drop for FdEnvGuard {
    fn drop(&mut self) {
        std::env::remove_var(TUN_FD_ENV);
    }
}

impl Engine for ForeignEngine {
    fn run(&self, invocation: &EngineInvocation) -> i32 {
        let mut argv: Vec<*mut c_char> = invocation
            .args()
            .iter()
            .map(|arg| arg.as_ptr() as *mut c_char)
            .collect();
        let argc = argv.len() as c_int;
        argv.push(ptr::null_mut());

        let _env = FdEnvGuard::export(invocation.tun_fd());
        debug!(argc, fd = invocation.tun_fd(), "entering engine main");

        // SAFETY: `argv` holds `argc` pointers into CStrings owned by
        // `invocation`, which outlives this call, followed by NULL.
        unsafe { (self.entry.main)(argc, argv.as_mut_ptr()) }
    }

    fn request_quit(&self) {
        // SAFETY: quit is documented as callable at any time.
        unsafe { (self.entry.quit)() }
    }

    fn read_counters(&self) -> Counters {
        let (mut tx_packets, mut tx_bytes) = (0usize, 0usize);
        let (mut rx_packets, mut rx_bytes) = (0usize, 0usize);
        // SAFETY: four valid, exclusive out-pointers.
        unsafe {
            (self.entry.stats)(&mut tx_packets, &mut tx_bytes, &mut rx_packets, &mut rx_bytes);
        }
        Counters {
            tx_packets: tx_packets as u64,
            tx_bytes: tx_bytes as u64,
            rx_packets: rx_packets as u64,
            rx_bytes: rx_bytes as u64,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, MutexGuard};

    /// What the stub main saw: argv, the NULL terminator check, and the env var.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct Observed {
        pub args: Vec<String>,
        pub argv_null_terminated: bool,
        pub fd_env: Option<String>,
    }

    static OBSERVED: Mutex<Option<Observed>> = Mutex::new(None);
    static QUIT_CALLS: AtomicUsize = AtomicUsize::new(0);
    static FOREIGN_LOCK: Mutex<()> = Mutex::new(());

    /// Serializes tests that share the stub statics and the process environment.
    pub(crate) fn foreign_lock() -> MutexGuard<'static, ()> {
        FOREIGN_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn take_observed() -> Option<Observed> {
        OBSERVED
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    unsafe extern "C" fn stub_main(argc: c_int, argv: *mut *mut c_char) -> c_int {
        let args = (0..argc as usize)
            .map(|i| CStr::from_ptr(*argv.add(i)).to_string_lossy().into_owned())
            .collect();
        let observed = Observed {
            args,
            argv_null_terminated: (*argv.add(argc as usize)).is_null(),
            fd_env: std::env::var(TUN_FD_ENV).ok(),
        };
        *OBSERVED
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(observed);
        7
    }

    unsafe extern "C" fn stub_quit() {
        QUIT_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn stub_stats(
        tx_packets: *mut usize,
        tx_bytes: *mut usize,
        rx_packets: *mut usize,
        rx_bytes: *mut usize,
    ) {
        *tx_packets = 1;
        *tx_bytes = 2;
        *rx_packets = 3;
        *rx_bytes = 4;
    }

    pub(crate) fn stub_engine() -> ForeignEngine {
        unsafe {
            ForeignEngine::from_entry_points(EngineEntryPoints {
                main: stub_main,
                quit: stub_quit,
                stats: stub_stats,
            })
        }
    }

    #[test]
    fn run_exports_descriptor_and_argv() {
        let _lock = foreign_lock();
        let engine = stub_engine();
        let invocation =
            EngineInvocation::new("hev-socks5-tunnel", Path::new("/tmp/a.yml"), 137).unwrap();

        let code = engine.run(&invocation);
        let observed = take_observed().unwrap();

        assert_eq!(code, 7);
        assert_eq!(observed.args, vec!["hev-socks5-tunnel", "-c", "/tmp/a.yml"]);
        assert!(observed.argv_null_terminated);
        assert_eq!(observed.fd_env.as_deref(), Some("137"));
    }

    #[test]
    fn descriptor_variable_is_removed_after_run() {
        let _lock = foreign_lock();
        let engine = stub_engine();
        let invocation = EngineInvocation::new("hev", Path::new("/tmp/b.yml"), 5).unwrap();

        engine.run(&invocation);
        take_observed();

        assert!(std::env::var(TUN_FD_ENV).is_err());
    }

    #[test]
    fn quit_and_stats_forward_to_entry_points() {
        let _lock = foreign_lock();
        let engine = stub_engine();

        let before = QUIT_CALLS.load(Ordering::SeqCst);
        engine.request_quit();
        engine.request_quit();
        assert_eq!(QUIT_CALLS.load(Ordering::SeqCst), before + 2);

        assert_eq!(
            engine.read_counters(),
            Counters {
                tx_packets: 1,
                tx_bytes: 2,
                rx_packets: 3,
                rx_bytes: 4,
            }
        );
    }
}
