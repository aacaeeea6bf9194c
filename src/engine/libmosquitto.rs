//! [`NativeEngine`] over the system `libmosquitto`.

use super::{NativeCallback, NativeEngine, TlsFiles};
use crate::conversions::opt_ptr;
use crate::error::{MosquittoError, MosquittoResult};
use crate::ffi::{self, sys, RawHandle};
use crate::types::Version;
use std::ffi::{c_int, c_uint, c_void, CStr};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// At most one live `LibMosquitto` per process: `mosquitto_lib_init` and
/// `mosquitto_lib_cleanup` manage process-wide state.
static ACQUIRED: AtomicBool = AtomicBool::new(false);

#[derive(Debug)]
pub struct LibMosquitto {
    _private: (),
}

impl LibMosquitto {
    /// Claim the process-wide native library.
    ///
    /// Fails with [`MosquittoError::Inval`] while another instance is alive.
    pub fn acquire() -> MosquittoResult<Self> {
        if ACQUIRED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MosquittoError::Inval);
        }
        Ok(Self { _private: () })
    }
}

impl Drop for LibMosquitto {
    fn drop(&mut self) {
        ACQUIRED.store(false, Ordering::Release);
    }
}

// SAFETY (applies to every `unsafe` block below): handles passed in come from
// `create` on this engine and have not been destroyed (trait contract);
// string arguments are borrowed `CStr`s that outlive the call; payload
// slices outlive the call and their lengths were checked by the facade.
impl NativeEngine for LibMosquitto {
    fn name(&self) -> &'static str {
        "libmosquitto"
    }

    fn lib_init(&self) -> c_int {
        unsafe { sys::mosquitto_lib_init() }
    }

    fn lib_cleanup(&self) -> c_int {
        unsafe { sys::mosquitto_lib_cleanup() }
    }

    fn lib_version(&self) -> Version {
        let (mut major, mut minor, mut revision) = (0, 0, 0);
        unsafe { sys::mosquitto_lib_version(&mut major, &mut minor, &mut revision) };
        Version::new(major, minor, revision)
    }

    fn create(&self, id: Option<&CStr>, clean_session: bool) -> MosquittoResult<RawHandle> {
        let ptr = unsafe { sys::mosquitto_new(opt_ptr(id), clean_session, std::ptr::null_mut()) };
        RawHandle::from_ptr(ptr).ok_or_else(|| {
            match io::Error::last_os_error().kind() {
                io::ErrorKind::InvalidInput => MosquittoError::Inval,
                _ => MosquittoError::NoMemory,
            }
        })
    }

    fn destroy(&self, handle: RawHandle) {
        unsafe { sys::mosquitto_destroy(handle.as_ptr()) }
    }

    fn reinitialise(&self, handle: RawHandle, id: Option<&CStr>, clean_session: bool) -> c_int {
        unsafe {
            sys::mosquitto_reinitialise(
                handle.as_ptr(),
                opt_ptr(id),
                clean_session,
                std::ptr::null_mut(),
            )
        }
    }

    fn user_data_set(&self, handle: RawHandle, userdata: *mut c_void) {
        unsafe { sys::mosquitto_user_data_set(handle.as_ptr(), userdata) }
    }

    fn callback_set(&self, handle: RawHandle, callback: NativeCallback) {
        let mosq = handle.as_ptr();
        unsafe {
            match callback {
                NativeCallback::Connect(cb) => sys::mosquitto_connect_callback_set(mosq, Some(cb)),
                NativeCallback::Message(cb) => sys::mosquitto_message_callback_set(mosq, Some(cb)),
                NativeCallback::Disconnect(cb) => {
                    sys::mosquitto_disconnect_callback_set(mosq, Some(cb))
                }
                NativeCallback::Publish(cb) => sys::mosquitto_publish_callback_set(mosq, Some(cb)),
                NativeCallback::Subscribe(cb) => {
                    sys::mosquitto_subscribe_callback_set(mosq, Some(cb))
                }
                NativeCallback::Unsubscribe(cb) => {
                    sys::mosquitto_unsubscribe_callback_set(mosq, Some(cb))
                }
                NativeCallback::Log(cb) => sys::mosquitto_log_callback_set(mosq, Some(cb)),
            }
        }
    }

    fn connect(
        &self,
        handle: RawHandle,
        host: &CStr,
        port: c_int,
        keepalive: c_int,
        bind_address: Option<&CStr>,
    ) -> c_int {
        unsafe {
            sys::mosquitto_connect_bind(
                handle.as_ptr(),
                host.as_ptr(),
                port,
                keepalive,
                opt_ptr(bind_address),
            )
        }
    }

    fn disconnect(&self, handle: RawHandle) -> c_int {
        unsafe { sys::mosquitto_disconnect(handle.as_ptr()) }
    }

    fn reconnect(&self, handle: RawHandle) -> c_int {
        unsafe { sys::mosquitto_reconnect(handle.as_ptr()) }
    }

    fn username_pw_set(
        &self,
        handle: RawHandle,
        username: Option<&CStr>,
        password: Option<&CStr>,
    ) -> c_int {
        unsafe {
            sys::mosquitto_username_pw_set(handle.as_ptr(), opt_ptr(username), opt_ptr(password))
        }
    }

    fn reconnect_delay_set(
        &self,
        handle: RawHandle,
        delay: c_uint,
        delay_max: c_uint,
        exponential_backoff: bool,
    ) -> c_int {
        unsafe {
            sys::mosquitto_reconnect_delay_set(handle.as_ptr(), delay, delay_max, exponential_backoff)
        }
    }

    fn socks5_set(
        &self,
        handle: RawHandle,
        host: &CStr,
        port: c_int,
        username: Option<&CStr>,
        password: Option<&CStr>,
    ) -> c_int {
        unsafe {
            sys::mosquitto_socks5_set(
                handle.as_ptr(),
                host.as_ptr(),
                port,
                opt_ptr(username),
                opt_ptr(password),
            )
        }
    }

    fn max_inflight_messages_set(&self, handle: RawHandle, max_inflight: c_uint) -> c_int {
        unsafe { sys::mosquitto_max_inflight_messages_set(handle.as_ptr(), max_inflight) }
    }

    fn protocol_version_set(&self, handle: RawHandle, version: c_int) -> c_int {
        let mut value = version;
        unsafe {
            sys::mosquitto_opts_set(
                handle.as_ptr(),
                ffi::MOSQ_OPT_PROTOCOL_VERSION,
                (&mut value as *mut c_int).cast(),
            )
        }
    }

    fn publish(
        &self,
        handle: RawHandle,
        mid: &mut c_int,
        topic: &CStr,
        payload: &[u8],
        qos: c_int,
        retain: bool,
    ) -> c_int {
        let Ok(len) = c_int::try_from(payload.len()) else {
            return ffi::MOSQ_ERR_PAYLOAD_SIZE;
        };
        unsafe {
            sys::mosquitto_publish(
                handle.as_ptr(),
                mid,
                topic.as_ptr(),
                len,
                payload.as_ptr().cast(),
                qos,
                retain,
            )
        }
    }

    fn subscribe(&self, handle: RawHandle, mid: &mut c_int, pattern: &CStr, qos: c_int) -> c_int {
        unsafe { sys::mosquitto_subscribe(handle.as_ptr(), mid, pattern.as_ptr(), qos) }
    }

    fn unsubscribe(&self, handle: RawHandle, mid: &mut c_int, pattern: &CStr) -> c_int {
        unsafe { sys::mosquitto_unsubscribe(handle.as_ptr(), mid, pattern.as_ptr()) }
    }

    fn will_set(
        &self,
        handle: RawHandle,
        topic: &CStr,
        payload: &[u8],
        qos: c_int,
        retain: bool,
    ) -> c_int {
        let Ok(len) = c_int::try_from(payload.len()) else {
            return ffi::MOSQ_ERR_PAYLOAD_SIZE;
        };
        unsafe {
            sys::mosquitto_will_set(
                handle.as_ptr(),
                topic.as_ptr(),
                len,
                payload.as_ptr().cast(),
                qos,
                retain,
            )
        }
    }

    fn will_clear(&self, handle: RawHandle) -> c_int {
        unsafe { sys::mosquitto_will_clear(handle.as_ptr()) }
    }

    fn loop_once(&self, handle: RawHandle, timeout_ms: c_int, max_packets: c_int) -> c_int {
        unsafe { sys::mosquitto_loop(handle.as_ptr(), timeout_ms, max_packets) }
    }

    fn loop_forever(&self, handle: RawHandle, timeout_ms: c_int, max_packets: c_int) -> c_int {
        unsafe { sys::mosquitto_loop_forever(handle.as_ptr(), timeout_ms, max_packets) }
    }

    fn loop_start(&self, handle: RawHandle) -> c_int {
        unsafe { sys::mosquitto_loop_start(handle.as_ptr()) }
    }

    fn loop_stop(&self, handle: RawHandle, force: bool) -> c_int {
        unsafe { sys::mosquitto_loop_stop(handle.as_ptr(), force) }
    }

    fn loop_read(&self, handle: RawHandle, max_packets: c_int) -> c_int {
        unsafe { sys::mosquitto_loop_read(handle.as_ptr(), max_packets) }
    }

    fn loop_write(&self, handle: RawHandle, max_packets: c_int) -> c_int {
        unsafe { sys::mosquitto_loop_write(handle.as_ptr(), max_packets) }
    }

    fn loop_misc(&self, handle: RawHandle) -> c_int {
        unsafe { sys::mosquitto_loop_misc(handle.as_ptr()) }
    }

    fn want_write(&self, handle: RawHandle) -> bool {
        unsafe { sys::mosquitto_want_write(handle.as_ptr()) }
    }

    fn threaded_set(&self, handle: RawHandle, threaded: bool) -> c_int {
        unsafe { sys::mosquitto_threaded_set(handle.as_ptr(), threaded) }
    }

    fn tls_set(
        &self,
        handle: RawHandle,
        files: TlsFiles<'_>,
        password_callback: Option<ffi::PasswordCallback>,
    ) -> c_int {
        unsafe {
            sys::mosquitto_tls_set(
                handle.as_ptr(),
                opt_ptr(files.cafile),
                opt_ptr(files.capath),
                opt_ptr(files.certfile),
                opt_ptr(files.keyfile),
                password_callback,
            )
        }
    }

    fn tls_opts_set(
        &self,
        handle: RawHandle,
        cert_reqs: c_int,
        tls_version: Option<&CStr>,
        ciphers: Option<&CStr>,
    ) -> c_int {
        unsafe {
            sys::mosquitto_tls_opts_set(
                handle.as_ptr(),
                cert_reqs,
                opt_ptr(tls_version),
                opt_ptr(ciphers),
            )
        }
    }

    fn tls_insecure_set(&self, handle: RawHandle, insecure: bool) -> c_int {
        unsafe { sys::mosquitto_tls_insecure_set(handle.as_ptr(), insecure) }
    }
}
