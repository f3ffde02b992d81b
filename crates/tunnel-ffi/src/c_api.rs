//! C ABI exports.
//!
//! Start functions return the engine exit code verbatim, or [`REJECTED`] with
//! the reason available from `hev_tunnel_last_error`. Every entry point
//! catches panics so none unwind into the caller.

use engine_adapter::Counters;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::{debug, error, warn};
use tunnel_config_and_utils::init_logging;
use tunnel_lifecycle::ConfigSource;

use crate::error::{
    clear_last_error, last_error_code, last_error_message, set_last_error, LayerError,
    LayerErrorCode, REJECTED,
};
use crate::runtime;

/// Number of counters written by [`hev_tunnel_get_stats`].
pub const HEV_TUNNEL_STATS_LEN: usize = 4;

/// Run `f` with a fresh last-error slot, mapping errors and panics to [`REJECTED`].
pub(crate) fn ffi_call<F>(op: &'static str, f: F) -> c_int
where
    F: FnOnce() -> Result<c_int, LayerError>,
{
    clear_last_error();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            warn!(op, code = err.code.as_raw(), error = %err, "call rejected");
            set_last_error(err);
            REJECTED
        }
        Err(_) => {
            error!(op, "panic caught at FFI boundary");
            set_last_error(LayerError::invalid_argument(format!("{} panicked", op)));
            REJECTED
        }
    }
}

/// Start through the process-wide lifecycle. Blocks for the life of the tunnel.
pub(crate) fn start(source: ConfigSource, tun_fd: c_int) -> Result<c_int, LayerError> {
    let lifecycle = runtime::lifecycle()?;
    let code = lifecycle.start(source, tun_fd)?;
    Ok(code.code())
}

/// Counters in host order, zero when idle or when nothing is installed.
pub(crate) fn host_stats() -> [u64; HEV_TUNNEL_STATS_LEN] {
    runtime::lifecycle()
        .map(|lifecycle| lifecycle.get_stats())
        .unwrap_or(Counters::ZERO)
        .to_host_array()
}

pub(crate) fn stop() {
    match runtime::lifecycle() {
        Ok(lifecycle) => lifecycle.stop(),
        Err(_) => debug!("stop requested with no engine installed"),
    }
}

pub(crate) fn is_running() -> bool {
    runtime::lifecycle().is_ok_and(|lifecycle| lifecycle.is_running())
}

pub(crate) fn path_source(path: PathBuf) -> Result<ConfigSource, LayerError> {
    if path.as_os_str().is_empty() {
        return Err(LayerError::invalid_argument("Config path cannot be empty"));
    }
    Ok(ConfigSource::ExistingPath(path))
}

#[cfg(unix)]
fn bytes_to_path(bytes: &[u8]) -> Result<PathBuf, LayerError> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    Ok(PathBuf::from(OsStr::from_bytes(bytes)))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: &[u8]) -> Result<PathBuf, LayerError> {
    std::str::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|e| LayerError::new(LayerErrorCode::ConfigExtraction, e.to_string()))
}

unsafe fn non_null_c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a CStr, LayerError> {
    if ptr.is_null() {
        return Err(LayerError::invalid_argument(format!("{} is null", what)));
    }
    Ok(CStr::from_ptr(ptr))
}

/// Start the tunnel with an existing config file and block until it stops.
///
/// # Safety
/// `config_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hev_tunnel_start_with_config_path(
    config_path: *const c_char,
    tun_fd: c_int,
) -> c_int {
    ffi_call("start_with_config_path", || {
        let raw = unsafe { non_null_c_str(config_path, "Config path")? };
        let source = path_source(bytes_to_path(raw.to_bytes())?)?;
        start(source, tun_fd)
    })
}

/// Start the tunnel with inline YAML and block until it stops.
///
/// # Safety
/// `config_yaml` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hev_tunnel_start_with_inline_config(
    config_yaml: *const c_char,
    tun_fd: c_int,
) -> c_int {
    ffi_call("start_with_inline_config", || {
        let raw = unsafe { non_null_c_str(config_yaml, "Config text")? };
        let text = raw.to_str().map_err(|e| {
            LayerError::new(
                LayerErrorCode::ConfigExtraction,
                format!("Config text is not UTF-8: {}", e),
            )
        })?;
        start(ConfigSource::inline(text), tun_fd)
    })
}

/// Ask the running tunnel to stop. Returns immediately.
#[no_mangle]
pub extern "C" fn hev_tunnel_stop() {
    ffi_call("stop", || {
        stop();
        Ok(0)
    });
}

/// Write `[tx_bytes, rx_bytes, tx_packets, rx_packets]` to `out`.
///
/// Returns 0, or [`REJECTED`] when `out` is null.
///
/// # Safety
/// `out` must be null or point to [`HEV_TUNNEL_STATS_LEN`] writable `u64`s.
#[no_mangle]
pub unsafe extern "C" fn hev_tunnel_get_stats(out: *mut u64) -> c_int {
    ffi_call("get_stats", || {
        if out.is_null() {
            return Err(LayerError::invalid_argument("Stats buffer is null"));
        }
        let stats = host_stats();
        // SAFETY: caller guarantees room for HEV_TUNNEL_STATS_LEN values.
        unsafe { std::ptr::copy_nonoverlapping(stats.as_ptr(), out, HEV_TUNNEL_STATS_LEN) };
        Ok(0)
    })
}

/// 1 while an engine run is live, else 0.
#[no_mangle]
pub extern "C" fn hev_tunnel_is_running() -> c_int {
    c_int::from(is_running())
}

/// Code of the last rejection on this thread, 0 if the last start, stop,
/// stats or logging call was not rejected. Other functions leave it as is.
#[no_mangle]
pub extern "C" fn hev_tunnel_last_error() -> c_int {
    last_error_code().as_raw()
}

/// Message of the last rejection on this thread, or null.
/// Free with [`hev_tunnel_free_string`].
#[no_mangle]
pub extern "C" fn hev_tunnel_last_error_message() -> *mut c_char {
    last_error_message()
        .and_then(|message| CString::new(message).ok())
        .map_or(std::ptr::null_mut(), CString::into_raw)
}

/// Release a string returned by this library.
///
/// # Safety
/// `s` must be null or a pointer obtained from this library, freed at most once.
#[no_mangle]
pub unsafe extern "C" fn hev_tunnel_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Install the tracing subscriber. A null `level` uses the level from
/// `config.json`. Returns 1 if this call installed it, 0 if logging was
/// already set up.
///
/// # Safety
/// `level` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hev_tunnel_init_logging(level: *const c_char) -> c_int {
    ffi_call("init_logging", || {
        if level.is_null() {
            return Ok(c_int::from(runtime::init_logging()));
        }
        let level = unsafe { CStr::from_ptr(level) }.to_string_lossy();
        Ok(c_int::from(init_logging(&runtime::settings().paths, &level)))
    })
}
