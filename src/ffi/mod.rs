//! # Raw Foreign ABI
//!
//! C-compatible types, constants and callback signatures of the native
//! mosquitto client library. Nothing in here has behavior; it is the fixed
//! vocabulary every [`NativeEngine`](crate::engine::NativeEngine) speaks.
//!
//! The values mirror `mosquitto.h` of the 1.6 series.

#![allow(non_camel_case_types)]

#[cfg(feature = "libmosquitto")]
pub mod sys;

use std::ffi::{c_char, c_int, c_void};
use std::fmt;
use std::ptr::NonNull;

/// Opaque native client struct. Only ever handled behind a pointer.
#[repr(C)]
pub struct mosquitto {
    _private: [u8; 0],
}

/// Message as delivered to the message callback.
#[repr(C)]
#[derive(Debug)]
pub struct mosquitto_message {
    pub mid: c_int,
    pub topic: *mut c_char,
    pub payload: *mut c_void,
    pub payloadlen: c_int,
    pub qos: c_int,
    pub retain: bool,
}

// Header version the bindings were written against
pub const LIBMOSQUITTO_MAJOR: c_int = 1;
pub const LIBMOSQUITTO_MINOR: c_int = 6;
pub const LIBMOSQUITTO_REVISION: c_int = 12;

// Result codes (enum mosq_err_t)
pub const MOSQ_ERR_AUTH_CONTINUE: c_int = -4;
pub const MOSQ_ERR_NO_SUBSCRIBERS: c_int = -3;
pub const MOSQ_ERR_SUB_EXISTS: c_int = -2;
pub const MOSQ_ERR_CONN_PENDING: c_int = -1;
pub const MOSQ_ERR_SUCCESS: c_int = 0;
pub const MOSQ_ERR_NOMEM: c_int = 1;
pub const MOSQ_ERR_PROTOCOL: c_int = 2;
pub const MOSQ_ERR_INVAL: c_int = 3;
pub const MOSQ_ERR_NO_CONN: c_int = 4;
pub const MOSQ_ERR_CONN_REFUSED: c_int = 5;
pub const MOSQ_ERR_NOT_FOUND: c_int = 6;
pub const MOSQ_ERR_CONN_LOST: c_int = 7;
pub const MOSQ_ERR_TLS: c_int = 8;
pub const MOSQ_ERR_PAYLOAD_SIZE: c_int = 9;
pub const MOSQ_ERR_NOT_SUPPORTED: c_int = 10;
pub const MOSQ_ERR_AUTH: c_int = 11;
pub const MOSQ_ERR_ACL_DENIED: c_int = 12;
pub const MOSQ_ERR_UNKNOWN: c_int = 13;
pub const MOSQ_ERR_ERRNO: c_int = 14;
pub const MOSQ_ERR_EAI: c_int = 15;
pub const MOSQ_ERR_PROXY: c_int = 16;
pub const MOSQ_ERR_PLUGIN_DEFER: c_int = 17;
pub const MOSQ_ERR_MALFORMED_UTF8: c_int = 18;
pub const MOSQ_ERR_KEEPALIVE: c_int = 19;
pub const MOSQ_ERR_LOOKUP: c_int = 20;

// Log severities
pub const MOSQ_LOG_NONE: c_int = 0x00;
pub const MOSQ_LOG_INFO: c_int = 0x01;
pub const MOSQ_LOG_NOTICE: c_int = 0x02;
pub const MOSQ_LOG_WARNING: c_int = 0x04;
pub const MOSQ_LOG_ERR: c_int = 0x08;
pub const MOSQ_LOG_DEBUG: c_int = 0x10;
pub const MOSQ_LOG_SUBSCRIBE: c_int = 0x20;
pub const MOSQ_LOG_UNSUBSCRIBE: c_int = 0x40;
pub const MOSQ_LOG_WEBSOCKETS: c_int = 0x80;
pub const MOSQ_LOG_ALL: c_int = 0xFFFF;

// Protocol versions accepted by MOSQ_OPT_PROTOCOL_VERSION
pub const MQTT_PROTOCOL_V31: c_int = 3;
pub const MQTT_PROTOCOL_V311: c_int = 4;

// enum mosq_opt_t
pub const MOSQ_OPT_PROTOCOL_VERSION: c_int = 1;

pub type ConnectCallback = unsafe extern "C" fn(*mut mosquitto, *mut c_void, c_int);
pub type DisconnectCallback = unsafe extern "C" fn(*mut mosquitto, *mut c_void, c_int);
pub type PublishCallback = unsafe extern "C" fn(*mut mosquitto, *mut c_void, c_int);
pub type MessageCallback =
    unsafe extern "C" fn(*mut mosquitto, *mut c_void, *const mosquitto_message);
pub type SubscribeCallback =
    unsafe extern "C" fn(*mut mosquitto, *mut c_void, c_int, c_int, *const c_int);
pub type UnsubscribeCallback = unsafe extern "C" fn(*mut mosquitto, *mut c_void, c_int);
pub type LogCallback = unsafe extern "C" fn(*mut mosquitto, *mut c_void, c_int, *const c_char);
/// `int pw_callback(char *buf, int size, int rwflag, void *userdata)`
pub type PasswordCallback = unsafe extern "C" fn(*mut c_char, c_int, c_int, *mut c_void) -> c_int;

/// The Opaque Native Handle of one native client connection.
///
/// The binding never dereferences it. It is passed back to foreign calls and
/// used as the Instance Registry key, nothing else.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(NonNull<mosquitto>);

// SAFETY: the handle is an opaque token. Rust code never reads or writes
// through it, so moving it between threads cannot create a data race on our
// side; the native library serializes its own access per handle.
unsafe impl Send for RawHandle {}
// SAFETY: see the `Send` impl above.
unsafe impl Sync for RawHandle {}

impl RawHandle {
    /// Wrap a pointer handed out by the foreign layer. Returns `None` for null.
    pub fn from_ptr(ptr: *mut mosquitto) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Recover a handle that was stored in a `void *userdata` slot.
    pub fn from_userdata(ptr: *mut c_void) -> Option<Self> {
        Self::from_ptr(ptr.cast())
    }

    pub fn as_ptr(self) -> *mut mosquitto {
        self.0.as_ptr()
    }

    pub fn as_userdata(self) -> *mut c_void {
        self.0.as_ptr().cast()
    }

    /// Address of the handle, used for diagnostics.
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({:#x})", self.addr())
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_pointer_is_not_a_handle() {
        assert!(RawHandle::from_ptr(std::ptr::null_mut()).is_none());
        assert!(RawHandle::from_userdata(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn test_userdata_round_trip_preserves_address() {
        let handle = RawHandle::from_ptr(0x1000 as *mut mosquitto).unwrap();
        let back = RawHandle::from_userdata(handle.as_userdata()).unwrap();
        assert_eq!(handle, back);
        assert_eq!(back.addr(), 0x1000);
        assert_eq!(format!("{handle}"), "0x1000");
    }
}
