//! # Native Engine Seam
//!
//! The foreign-call surface the client facade consumes, expressed as a trait
//! so the facade and the callback bridge are independent of how the native
//! library is reached.
//!
//! Implementations return the raw integer result code of each call; the
//! facade owns the translation into [`MosquittoError`](crate::MosquittoError).
//! Nothing in this trait retries, buffers or reorders: it is a thin
//! translate-and-forward layer.
//!
//! - [`LibMosquitto`] (feature `libmosquitto`) links the system library.
//! - [`LoopbackEngine`] runs in-process and invokes the registered
//!   trampolines the same way the native library does.

#[cfg(feature = "libmosquitto")]
pub mod libmosquitto;
pub mod loopback;

#[cfg(feature = "libmosquitto")]
pub use libmosquitto::LibMosquitto;
pub use loopback::LoopbackEngine;

use crate::error::MosquittoResult;
use crate::ffi::{self, RawHandle};
use crate::types::Version;
use std::ffi::{c_int, c_uint, c_void, CStr};
use std::fmt;

/// One `*_callback_set` registration: the event kind and its trampoline.
#[derive(Clone, Copy)]
pub enum NativeCallback {
    Connect(ffi::ConnectCallback),
    Message(ffi::MessageCallback),
    Disconnect(ffi::DisconnectCallback),
    Publish(ffi::PublishCallback),
    Subscribe(ffi::SubscribeCallback),
    Unsubscribe(ffi::UnsubscribeCallback),
    Log(ffi::LogCallback),
}

impl NativeCallback {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Message(_) => "message",
            Self::Disconnect(_) => "disconnect",
            Self::Publish(_) => "publish",
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::Log(_) => "log",
        }
    }
}

impl fmt::Debug for NativeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeCallback::{}", self.kind())
    }
}

/// Arguments of `tls_set`, already marshaled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsFiles<'a> {
    pub cafile: Option<&'a CStr>,
    pub capath: Option<&'a CStr>,
    pub certfile: Option<&'a CStr>,
    pub keyfile: Option<&'a CStr>,
}

/// Foreign-call surface of the native MQTT client library.
///
/// Every method taking a [`RawHandle`] requires a handle returned by
/// [`create`](NativeEngine::create) on the same engine and not yet passed to
/// [`destroy`](NativeEngine::destroy).
pub trait NativeEngine: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    // Library-wide state
    fn lib_init(&self) -> c_int;
    fn lib_cleanup(&self) -> c_int;
    fn lib_version(&self) -> Version;

    // Handle lifecycle
    fn create(&self, id: Option<&CStr>, clean_session: bool) -> MosquittoResult<RawHandle>;
    fn destroy(&self, handle: RawHandle);
    fn reinitialise(&self, handle: RawHandle, id: Option<&CStr>, clean_session: bool) -> c_int;
    fn user_data_set(&self, handle: RawHandle, userdata: *mut c_void);
    fn callback_set(&self, handle: RawHandle, callback: NativeCallback);

    // Connection
    fn connect(
        &self,
        handle: RawHandle,
        host: &CStr,
        port: c_int,
        keepalive: c_int,
        bind_address: Option<&CStr>,
    ) -> c_int;
    fn disconnect(&self, handle: RawHandle) -> c_int;
    fn reconnect(&self, handle: RawHandle) -> c_int;
    fn username_pw_set(
        &self,
        handle: RawHandle,
        username: Option<&CStr>,
        password: Option<&CStr>,
    ) -> c_int;
    fn reconnect_delay_set(
        &self,
        handle: RawHandle,
        delay: c_uint,
        delay_max: c_uint,
        exponential_backoff: bool,
    ) -> c_int;
    fn socks5_set(
        &self,
        handle: RawHandle,
        host: &CStr,
        port: c_int,
        username: Option<&CStr>,
        password: Option<&CStr>,
    ) -> c_int;
    fn max_inflight_messages_set(&self, handle: RawHandle, max_inflight: c_uint) -> c_int;
    fn protocol_version_set(&self, handle: RawHandle, version: c_int) -> c_int;

    // Messaging
    fn publish(
        &self,
        handle: RawHandle,
        mid: &mut c_int,
        topic: &CStr,
        payload: &[u8],
        qos: c_int,
        retain: bool,
    ) -> c_int;
    fn subscribe(&self, handle: RawHandle, mid: &mut c_int, pattern: &CStr, qos: c_int) -> c_int;
    fn unsubscribe(&self, handle: RawHandle, mid: &mut c_int, pattern: &CStr) -> c_int;
    fn will_set(
        &self,
        handle: RawHandle,
        topic: &CStr,
        payload: &[u8],
        qos: c_int,
        retain: bool,
    ) -> c_int;
    fn will_clear(&self, handle: RawHandle) -> c_int;

    // Network loop
    fn loop_once(&self, handle: RawHandle, timeout_ms: c_int, max_packets: c_int) -> c_int;
    fn loop_forever(&self, handle: RawHandle, timeout_ms: c_int, max_packets: c_int) -> c_int;
    fn loop_start(&self, handle: RawHandle) -> c_int;
    /// Blocks until the background network thread has exited.
    fn loop_stop(&self, handle: RawHandle, force: bool) -> c_int;
    fn loop_read(&self, handle: RawHandle, max_packets: c_int) -> c_int;
    fn loop_write(&self, handle: RawHandle, max_packets: c_int) -> c_int;
    fn loop_misc(&self, handle: RawHandle) -> c_int;
    fn want_write(&self, handle: RawHandle) -> bool;
    fn threaded_set(&self, handle: RawHandle, threaded: bool) -> c_int;

    // TLS
    fn tls_set(
        &self,
        handle: RawHandle,
        files: TlsFiles<'_>,
        password_callback: Option<ffi::PasswordCallback>,
    ) -> c_int;
    fn tls_opts_set(
        &self,
        handle: RawHandle,
        cert_reqs: c_int,
        tls_version: Option<&CStr>,
        ciphers: Option<&CStr>,
    ) -> c_int;
    fn tls_insecure_set(&self, handle: RawHandle, insecure: bool) -> c_int;
}
