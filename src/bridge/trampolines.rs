//! Context-free entry points invoked by the native library.
//!
//! Every trampoline re-derives its client from the handle argument through
//! the global instance registry, marshals the raw arguments, and calls the
//! client's handler for that event kind. Misses, malformed data and handler
//! panics end at the trampoline; nothing unwinds into foreign code.

use crate::client::{ClientInner, LifecycleState};
use crate::conversions::{granted_qos_from_raw, message_from_raw, string_from_raw};
use crate::engine::{NativeCallback, NativeEngine};
use crate::ffi::{mosquitto, mosquitto_message, RawHandle};
use crate::logging::NATIVE_LOG_TARGET;
use crate::registry::instances;
use crate::types::{ConnectionResponseCode, DisconnectReason, LogLevel, MessageId};
use std::ffi::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace, warn};

/// Point every event callback of `handle` at this module and store the
/// handle as its userdata.
pub(crate) fn register_trampolines(engine: &dyn NativeEngine, handle: RawHandle) {
    engine.user_data_set(handle, handle.as_userdata());
    for callback in [
        NativeCallback::Connect(on_connect),
        NativeCallback::Message(on_message),
        NativeCallback::Disconnect(on_disconnect),
        NativeCallback::Publish(on_publish),
        NativeCallback::Subscribe(on_subscribe),
        NativeCallback::Unsubscribe(on_unsubscribe),
        NativeCallback::Log(on_log),
    ] {
        engine.callback_set(handle, callback);
    }
    trace!(handle = %handle, "Trampolines registered");
}

/// Run a trampoline body, containing any panic it raises.
fn guarded<R>(kind: &'static str, fallback: R, body: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|reason| (*reason).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            error!(event = kind, reason = %reason, "Event handler panicked");
            fallback
        }
    }
}

/// The active client registered for `handle`, if any.
fn resolve(handle: RawHandle, kind: &'static str) -> Option<Arc<ClientInner>> {
    let Some(client) = instances().lookup(handle) else {
        trace!(handle = %handle, event = kind, "Dropping event for unregistered handle");
        return None;
    };
    if client.state() != LifecycleState::Active {
        trace!(handle = %handle, event = kind, state = ?client.state(), "Dropping event for inactive client");
        return None;
    }
    Some(client)
}

fn resolve_ptr(mosq: *mut mosquitto, kind: &'static str) -> Option<Arc<ClientInner>> {
    let Some(handle) = RawHandle::from_ptr(mosq) else {
        warn!(event = kind, "Dropping event with null handle");
        return None;
    };
    resolve(handle, kind)
}

/// # Safety
///
/// Called by the native library with the handle the callback was set on.
pub unsafe extern "C" fn on_connect(mosq: *mut mosquitto, _userdata: *mut c_void, rc: c_int) {
    guarded("connect", (), || {
        let Some(client) = resolve_ptr(mosq, "connect") else {
            return;
        };
        let handler = client.handlers.read().on_connect.clone();
        if let Some(handler) = handler {
            handler(ConnectionResponseCode::from(rc));
        }
    })
}

/// # Safety
///
/// `message` is null or points to a message valid until this call returns.
pub unsafe extern "C" fn on_message(
    mosq: *mut mosquitto,
    _userdata: *mut c_void,
    message: *const mosquitto_message,
) {
    guarded("message", (), || {
        let Some(client) = resolve_ptr(mosq, "message") else {
            return;
        };
        // SAFETY: non-null pointers from the native library are valid for
        // the duration of the callback
        let Some(raw) = (unsafe { message.as_ref() }) else {
            warn!(handle = ?mosq, "Dropping null message");
            return;
        };
        // SAFETY: same callback-duration contract for topic and payload
        let Some(message) = (unsafe { message_from_raw(raw) }) else {
            return;
        };
        let handler = client.handlers.read().on_message.clone();
        if let Some(handler) = handler {
            handler(&message);
        }
    })
}

/// # Safety
///
/// Called by the native library with the handle the callback was set on.
pub unsafe extern "C" fn on_disconnect(mosq: *mut mosquitto, _userdata: *mut c_void, rc: c_int) {
    guarded("disconnect", (), || {
        let Some(client) = resolve_ptr(mosq, "disconnect") else {
            return;
        };
        let handler = client.handlers.read().on_disconnect.clone();
        if let Some(handler) = handler {
            handler(DisconnectReason::from(rc));
        }
    })
}

/// # Safety
///
/// Called by the native library with the handle the callback was set on.
pub unsafe extern "C" fn on_publish(mosq: *mut mosquitto, _userdata: *mut c_void, mid: c_int) {
    guarded("publish", (), || {
        let Some(client) = resolve_ptr(mosq, "publish") else {
            return;
        };
        let handler = client.handlers.read().on_publish.clone();
        if let Some(handler) = handler {
            handler(MessageId(mid));
        }
    })
}

/// # Safety
///
/// `granted` is null or points to `count` readable integers valid until this
/// call returns.
pub unsafe extern "C" fn on_subscribe(
    mosq: *mut mosquitto,
    _userdata: *mut c_void,
    mid: c_int,
    count: c_int,
    granted: *const c_int,
) {
    guarded("subscribe", (), || {
        let Some(client) = resolve_ptr(mosq, "subscribe") else {
            return;
        };
        // SAFETY: the native library passes `count` readable entries
        let Some(granted) = (unsafe { granted_qos_from_raw(granted, count) }) else {
            warn!(handle = ?mosq, mid = mid, count = count, "Dropping malformed SUBACK");
            return;
        };
        let handler = client.handlers.read().on_subscribe.clone();
        if let Some(handler) = handler {
            handler(MessageId(mid), &granted);
        }
    })
}

/// # Safety
///
/// Called by the native library with the handle the callback was set on.
pub unsafe extern "C" fn on_unsubscribe(mosq: *mut mosquitto, _userdata: *mut c_void, mid: c_int) {
    guarded("unsubscribe", (), || {
        let Some(client) = resolve_ptr(mosq, "unsubscribe") else {
            return;
        };
        let handler = client.handlers.read().on_unsubscribe.clone();
        if let Some(handler) = handler {
            handler(MessageId(mid));
        }
    })
}

/// # Safety
///
/// `line` is null or a NUL-terminated string valid until this call returns.
pub unsafe extern "C" fn on_log(
    mosq: *mut mosquitto,
    _userdata: *mut c_void,
    level: c_int,
    line: *const c_char,
) {
    guarded("log", (), || {
        let Some(client) = resolve_ptr(mosq, "log") else {
            return;
        };
        // SAFETY: forwarded from the callback contract
        let Some(line) = (unsafe { string_from_raw(line) }) else {
            warn!(handle = ?mosq, level = level, "Dropping null or non-UTF-8 log line");
            return;
        };
        let level = LogLevel::try_from(level).unwrap_or(LogLevel::All);
        forward_to_tracing(client.handle(), level, &line);

        let handler = client.handlers.read().on_log.clone();
        if let Some(handler) = handler {
            handler(level, &line);
        }
    })
}

fn forward_to_tracing(handle: RawHandle, level: LogLevel, line: &str) {
    match level.tracing_level() {
        tracing::Level::ERROR => {
            tracing::error!(target: NATIVE_LOG_TARGET, handle = %handle, "{}", line)
        }
        tracing::Level::WARN => {
            tracing::warn!(target: NATIVE_LOG_TARGET, handle = %handle, "{}", line)
        }
        tracing::Level::INFO => {
            tracing::info!(target: NATIVE_LOG_TARGET, handle = %handle, "{}", line)
        }
        tracing::Level::DEBUG => {
            tracing::debug!(target: NATIVE_LOG_TARGET, handle = %handle, "{}", line)
        }
        tracing::Level::TRACE => {
            tracing::trace!(target: NATIVE_LOG_TARGET, handle = %handle, "{}", line)
        }
    }
}

/// TLS private-key password request.
///
/// `userdata` carries the handle. Copies the stored key password into `buf`
/// and returns its length, or returns 0 when no password is stored or it is
/// longer than `size` bytes. The returned length is authoritative; a
/// terminating NUL is written only when there is room for it. Never calls a
/// user handler.
///
/// # Safety
///
/// `buf` is null or valid for writes of `size` bytes.
pub unsafe extern "C" fn on_password(
    buf: *mut c_char,
    size: c_int,
    _rwflag: c_int,
    userdata: *mut c_void,
) -> c_int {
    guarded("password", 0, || {
        if buf.is_null() {
            return 0;
        }
        let Some(handle) = RawHandle::from_userdata(userdata) else {
            return 0;
        };
        let Some(client) = resolve(handle, "password") else {
            return 0;
        };
        let password = client.key_password.read();
        let Some(password) = password.as_deref() else {
            return 0;
        };
        let Ok(len) = c_int::try_from(password.len()) else {
            return 0;
        };
        if len > size {
            warn!(handle = %handle, size = size, "Key password does not fit the buffer");
            return 0;
        }
        // SAFETY: `buf` holds `size` bytes and `len <= size`
        unsafe {
            std::ptr::copy_nonoverlapping(password.as_ptr(), buf.cast::<u8>(), password.len());
            if len < size {
                *buf.add(password.len()) = 0;
            }
        }
        len
    })
}
