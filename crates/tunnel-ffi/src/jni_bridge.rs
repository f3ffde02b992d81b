//! JNI exports for `cc.hev.socks5.tunnel.HevSocks5Tunnel`.
//!
//! Same semantics as the C functions: start calls return the engine exit
//! code or `-1`, stats come back as `long[4]` in host order.

use ::jni::objects::{JObject, JString};
use ::jni::sys::{jint, jlong, jlongArray, jsize, JNI_ERR, JNI_VERSION_1_6};
use ::jni::{JNIEnv, JavaVM};
use std::os::raw::c_void;
use std::panic;
use std::path::PathBuf;
use tracing::{debug, error, info};
use tunnel_lifecycle::ConfigSource;

use crate::c_api::{ffi_call, host_stats, path_source, start, stop};
use crate::error::{LayerError, LayerErrorCode};
use crate::runtime;

fn read_string(env: &mut JNIEnv, value: &JString, what: &str) -> Result<String, LayerError> {
    if value.is_null() {
        return Err(LayerError::invalid_argument(format!("{} cannot be null", what)));
    }
    let java_str = env.get_string(value).map_err(|e| {
        LayerError::new(
            LayerErrorCode::ConfigExtraction,
            format!("Failed to get {}: {}", what, e),
        )
    })?;
    Ok(java_str.into())
}

#[no_mangle]
pub extern "system" fn Java_cc_hev_socks5_tunnel_HevSocks5Tunnel_nativeStart<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    config_path: JString<'local>,
    tun_fd: jint,
) -> jint {
    ffi_call("nativeStart", || {
        let path = read_string(&mut env, &config_path, "Config path")?;
        start(path_source(PathBuf::from(path))?, tun_fd)
    })
}

#[no_mangle]
pub extern "system" fn Java_cc_hev_socks5_tunnel_HevSocks5Tunnel_nativeStartFromString<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    config_yaml: JString<'local>,
    tun_fd: jint,
) -> jint {
    ffi_call("nativeStartFromString", || {
        let text = read_string(&mut env, &config_yaml, "Config text")?;
        start(ConfigSource::inline(text), tun_fd)
    })
}

#[no_mangle]
pub extern "system" fn Java_cc_hev_socks5_tunnel_HevSocks5Tunnel_nativeStop<'local>(
    _env: JNIEnv<'local>,
    _this: JObject<'local>,
) {
    ffi_call("nativeStop", || {
        stop();
        Ok(0)
    });
}

/// `long[]{txBytes, rxBytes, txPackets, rxPackets}`, or null if the array
/// cannot be allocated.
#[no_mangle]
pub extern "system" fn Java_cc_hev_socks5_tunnel_HevSocks5Tunnel_nativeGetStats<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
) -> jlongArray {
    let stats = panic::catch_unwind(host_stats).unwrap_or_default();
    let values = stats.map(|value| value as jlong);

    match new_long_array(&mut env, &values) {
        Ok(array) => array,
        Err(e) => {
            error!(error = %e, "failed to create stats array");
            std::ptr::null_mut()
        }
    }
}

fn new_long_array(env: &mut JNIEnv, values: &[jlong]) -> ::jni::errors::Result<jlongArray> {
    let array = env.new_long_array(values.len() as jsize)?;
    env.set_long_array_region(&array, 0, values)?;
    Ok(array.into_raw())
}

/// Read the private `descriptor` field of a `java.io.FileDescriptor`; -1 on failure.
#[no_mangle]
pub extern "system" fn Java_cc_hev_socks5_tunnel_HevSocks5Tunnel_getFdFromFileDescriptor<
    'local,
>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    file_descriptor: JObject<'local>,
) -> jint {
    ffi_call("getFdFromFileDescriptor", || {
        if file_descriptor.is_null() {
            return Err(LayerError::invalid_argument("FileDescriptor is null"));
        }
        let fd = env
            .get_field(&file_descriptor, "descriptor", "I")
            .and_then(|value| value.i())
            .map_err(|e| {
                let _ = env.exception_clear();
                LayerError::invalid_argument(format!("Failed to read descriptor field: {}", e))
            })?;
        debug!(fd, "extracted TUN descriptor");
        Ok(fd)
    })
}

#[no_mangle]
pub extern "system" fn JNI_OnLoad(vm: *mut ::jni::sys::JavaVM, _reserved: *mut c_void) -> jint {
    let _ = panic::catch_unwind(runtime::init_logging);

    // SAFETY: the VM pointer comes straight from the JVM's library loader.
    let vm = match unsafe { JavaVM::from_raw(vm) } {
        Ok(vm) => vm,
        Err(e) => {
            error!(error = %e, "invalid JavaVM pointer");
            return JNI_ERR;
        }
    };
    if let Err(e) = vm.get_env() {
        error!(error = %e, "failed to get JNI environment");
        return JNI_ERR;
    }

    info!("HevSocks5Tunnel JNI loaded");
    JNI_VERSION_1_6
}
