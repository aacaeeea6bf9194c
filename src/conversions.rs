//! # Value Marshaling
//!
//! Pure conversions between raw foreign values and domain values, in both
//! directions. No shared state; every function here is safe to call from any
//! thread, including foreign-owned callback threads.
//!
//! Conversions on the callback path return `Option` and never fail loudly:
//! a `None` means "malformed, drop the event". Conversions on the synchronous
//! call path return [`MosquittoResult`] so the facade can surface them.

use crate::error::{MosquittoError, MosquittoResult};
use crate::ffi;
use crate::types::{Message, MessageId, Payload, QoS};
use std::ffi::{c_char, c_int, CStr, CString};
use std::path::Path;
use tracing::warn;

/// Keep the valid QoS levels of a granted-QoS list, in order.
///
/// Out-of-range entries (including the `0x80` SUBACK failure code) are
/// dropped individually instead of failing the whole list.
pub fn qos_list(raw: &[c_int]) -> Vec<QoS> {
    raw.iter()
        .filter_map(|&level| QoS::try_from(level).ok())
        .collect()
}

/// Marshal the granted-QoS array of a SUBACK callback.
///
/// Returns `None` for a null array or a non-positive count.
///
/// # Safety
///
/// If `granted` is non-null it must point to `count` readable `c_int`s.
pub unsafe fn granted_qos_from_raw(granted: *const c_int, count: c_int) -> Option<Vec<QoS>> {
    if granted.is_null() {
        return None;
    }
    let len = usize::try_from(count).ok().filter(|&len| len > 0)?;
    // SAFETY: caller guarantees `granted` is readable for `count` elements
    let raw = unsafe { std::slice::from_raw_parts(granted, len) };
    Some(qos_list(raw))
}

/// Copy a NUL-terminated foreign string into an owned `String`.
///
/// Returns `None` for null or non-UTF-8 input.
///
/// # Safety
///
/// If `ptr` is non-null it must point to a NUL-terminated string that stays
/// valid for the duration of this call.
pub unsafe fn string_from_raw(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: caller guarantees a valid NUL-terminated string
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .ok()
        .map(str::to_owned)
}

/// Marshal a foreign message into an owned [`Message`].
///
/// A null topic or a non-UTF-8 topic makes the message malformed. An
/// out-of-range QoS byte falls back to [`QoS::AtMostOnce`].
///
/// # Safety
///
/// `topic` and `payload` of `raw` must be valid as described by the native
/// message callback contract for the duration of this call.
pub unsafe fn message_from_raw(raw: &ffi::mosquitto_message) -> Option<Message> {
    // SAFETY: forwarded from the caller's contract
    let Some(topic) = (unsafe { string_from_raw(raw.topic) }) else {
        warn!(mid = raw.mid, "Dropping message with missing or non-UTF-8 topic");
        return None;
    };

    let qos = QoS::try_from(raw.qos).unwrap_or_else(|level| {
        warn!(mid = raw.mid, qos = level, topic = %topic, "Unexpected QoS on incoming message");
        QoS::AtMostOnce
    });

    let len = usize::try_from(raw.payloadlen).unwrap_or(0);
    // SAFETY: the native library guarantees `payloadlen` readable bytes
    let payload = unsafe { Payload::from_raw(raw.payload.cast_const(), len) };

    Some(Message {
        id: MessageId(raw.mid),
        topic,
        payload,
        qos,
        retain: raw.retain,
    })
}

/// Marshal a string argument for a foreign call.
pub fn to_cstring(value: &str) -> MosquittoResult<CString> {
    CString::new(value).map_err(|_| MosquittoError::Inval)
}

/// Marshal an optional string argument for a foreign call.
pub fn to_optional_cstring(value: Option<&str>) -> MosquittoResult<Option<CString>> {
    value.map(to_cstring).transpose()
}

/// Marshal an optional path argument for a foreign call.
pub fn path_to_cstring(path: Option<&Path>) -> MosquittoResult<Option<CString>> {
    path.map(|path| path.to_str().ok_or(MosquittoError::Inval).and_then(to_cstring))
        .transpose()
}

/// Payload length as the native `int` length argument.
pub fn payload_len(payload: &[u8]) -> MosquittoResult<c_int> {
    c_int::try_from(payload.len()).map_err(|_| MosquittoError::PayloadSize)
}

/// Pointer form of an optional C string, null when absent.
pub fn opt_ptr(value: Option<&CStr>) -> *const c_char {
    value.map_or(std::ptr::null(), CStr::as_ptr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_qos_entry_is_dropped_in_order() {
        assert_eq!(
            qos_list(&[2, 7, 0, 1]),
            vec![QoS::ExactlyOnce, QoS::AtMostOnce, QoS::AtLeastOnce]
        );
        assert_eq!(qos_list(&[0x80]), Vec::<QoS>::new());
    }

    #[test]
    fn test_granted_qos_rejects_null_and_empty() {
        let granted = [1, 2];
        // SAFETY: null and zero-count inputs are rejected before any read
        unsafe {
            assert_eq!(granted_qos_from_raw(std::ptr::null(), 2), None);
            assert_eq!(granted_qos_from_raw(granted.as_ptr(), 0), None);
            assert_eq!(granted_qos_from_raw(granted.as_ptr(), -3), None);
        }
        // SAFETY: `granted` holds two elements
        let qos = unsafe { granted_qos_from_raw(granted.as_ptr(), 2) };
        assert_eq!(qos, Some(vec![QoS::AtLeastOnce, QoS::ExactlyOnce]));
    }

    #[test]
    fn test_message_from_raw() {
        let topic = CString::new("t").unwrap();
        let payload = b"hello";
        let raw = ffi::mosquitto_message {
            mid: 17,
            topic: topic.as_ptr().cast_mut(),
            payload: payload.as_ptr().cast_mut().cast(),
            payloadlen: payload.len() as c_int,
            qos: 2,
            retain: false,
        };
        // SAFETY: topic and payload outlive the call
        let message = unsafe { message_from_raw(&raw) }.unwrap();
        assert_eq!(message.id, MessageId(17));
        assert_eq!(message.topic, "t");
        assert_eq!(message.payload.as_str(), Some("hello"));
        assert_eq!(message.qos, QoS::ExactlyOnce);
        assert!(!message.retain);
    }

    #[test]
    fn test_message_with_null_topic_is_malformed() {
        let raw = ffi::mosquitto_message {
            mid: 1,
            topic: std::ptr::null_mut(),
            payload: std::ptr::null_mut(),
            payloadlen: 0,
            qos: 0,
            retain: false,
        };
        // SAFETY: null pointers are checked before use
        assert!(unsafe { message_from_raw(&raw) }.is_none());
    }

    #[test]
    fn test_message_with_bad_qos_falls_back() {
        let topic = CString::new("a/b").unwrap();
        let raw = ffi::mosquitto_message {
            mid: 2,
            topic: topic.as_ptr().cast_mut(),
            payload: std::ptr::null_mut(),
            payloadlen: 0,
            qos: 9,
            retain: true,
        };
        // SAFETY: topic outlives the call; payload is null with zero length
        let message = unsafe { message_from_raw(&raw) }.unwrap();
        assert_eq!(message.qos, QoS::AtMostOnce);
        assert!(message.payload.is_empty());
        assert!(message.retain);
    }

    #[test]
    fn test_interior_nul_is_invalid_argument() {
        assert_eq!(to_cstring("a\0b"), Err(MosquittoError::Inval));
        assert_eq!(to_optional_cstring(None), Ok(None));
        assert!(to_optional_cstring(Some("id")).unwrap().is_some());
    }

    #[test]
    fn test_opt_ptr_is_null_for_none() {
        assert!(opt_ptr(None).is_null());
        let value = CString::new("x").unwrap();
        assert_eq!(opt_ptr(Some(&value)), value.as_ptr());
    }
}
