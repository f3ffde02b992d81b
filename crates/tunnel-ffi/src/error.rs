//! Layer error codes and the per-thread last-error slot.
//!
//! Start calls return the engine's exit code verbatim, so a layer rejection
//! (`-1`) can look like an engine failure. `hev_tunnel_last_error` tells them
//! apart: it is `0` after a call that reached the engine.

use std::cell::RefCell;
use std::os::raw::c_int;
use thiserror::Error;
use tunnel_lifecycle::TunnelError;

/// Return value of a call rejected by this layer.
pub const REJECTED: c_int = -1;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerErrorCode {
    None = 0,
    AlreadyRunning = -1,
    ConfigMaterialization = -2,
    ConfigExtraction = -3,
    InvalidDescriptor = -4,
    InvalidArgument = -5,
    /// No engine installed and none linked.
    NotInitialized = -6,
    EngineFault = -7,
}

impl LayerErrorCode {
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LayerError {
    pub code: LayerErrorCode,
    pub message: String,
}

impl LayerError {
    pub fn new(code: LayerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(LayerErrorCode::InvalidArgument, message)
    }

    pub fn not_initialized() -> Self {
        Self::new(
            LayerErrorCode::NotInitialized,
            "No tunnel engine installed",
        )
    }
}

impl From<TunnelError> for LayerError {
    fn from(err: TunnelError) -> Self {
        let code = match &err {
            TunnelError::AlreadyRunning => LayerErrorCode::AlreadyRunning,
            TunnelError::ConfigMaterialization(_) => LayerErrorCode::ConfigMaterialization,
            TunnelError::ConfigExtraction(_) => LayerErrorCode::ConfigExtraction,
            TunnelError::InvalidDescriptor(_) => LayerErrorCode::InvalidDescriptor,
            TunnelError::EngineFault(_) => LayerErrorCode::EngineFault,
        };
        Self::new(code, err.to_string())
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<LayerError>> = const { RefCell::new(None) };
}

pub(crate) fn set_last_error(err: LayerError) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err));
}

pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

pub(crate) fn last_error_code() -> LayerErrorCode {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(LayerErrorCode::None, |err| err.code)
    })
}

pub(crate) fn last_error_message() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map(|err| err.message.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tunnel_errors_map_to_codes() {
        let cases = [
            (TunnelError::AlreadyRunning, -1),
            (
                TunnelError::ConfigMaterialization(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "short",
                )),
                -2,
            ),
            (TunnelError::ConfigExtraction("nul".into()), -3),
            (TunnelError::InvalidDescriptor(-9), -4),
            (TunnelError::EngineFault(3), -7),
        ];
        for (err, raw) in cases {
            assert_eq!(LayerError::from(err).code.as_raw(), raw);
        }
    }

    #[test]
    fn last_error_is_per_thread() {
        set_last_error(LayerError::invalid_argument("bad"));
        assert_eq!(last_error_code(), LayerErrorCode::InvalidArgument);

        let other = std::thread::spawn(last_error_code).join().unwrap();
        assert_eq!(other, LayerErrorCode::None);

        assert_eq!(last_error_message().as_deref(), Some("bad"));
        clear_last_error();
        assert_eq!(last_error_code(), LayerErrorCode::None);
        assert_eq!(last_error_message(), None);
    }
}
