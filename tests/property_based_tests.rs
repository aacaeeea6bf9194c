//! Property-based tests for the marshaling and error-mapping layer.
//!
//! These cover the invariants the callback bridge relies on for every raw
//! value the native library could hand it, not just the documented ones.

use proptest::prelude::*;
use smosquitto::conversions::{granted_qos_from_raw, qos_list};
use smosquitto::{
    check_result_code, ConnectionResponseCode, DisconnectReason, LogLevel, MosquittoError,
    Payload, QoS,
};
use std::ffi::c_int;

proptest! {
    /// Every non-zero code maps to exactly one error that maps back to it.
    #[test]
    fn prop_error_code_round_trip(code in any::<i32>()) {
        match MosquittoError::from_code(code) {
            None => prop_assert_eq!(code, 0),
            Some(error) => {
                prop_assert_ne!(code, 0);
                prop_assert_eq!(error.code(), code);
                prop_assert_eq!(check_result_code(code), Err(error));
            }
        }
    }

    /// Disconnect reasons agree with the error taxonomy.
    #[test]
    fn prop_disconnect_reason_follows_error_mapping(code in any::<i32>()) {
        let reason = DisconnectReason::from(code);
        match MosquittoError::from_code(code) {
            None => prop_assert_eq!(reason, DisconnectReason::UserInitiated),
            Some(error) => prop_assert_eq!(reason, DisconnectReason::Error(error)),
        }
    }

    /// Only code 0 is a successful CONNACK; undocumented codes keep their value.
    #[test]
    fn prop_connection_response_preserves_unknown_codes(code in any::<i32>()) {
        let response = ConnectionResponseCode::from(code);
        prop_assert_eq!(response.is_success(), code == 0);
        if !(0..=3).contains(&code) {
            prop_assert_eq!(response, ConnectionResponseCode::Unknown(code));
        }
    }

    /// Granted-QoS filtering keeps valid entries in order and nothing else.
    #[test]
    fn prop_qos_list_keeps_valid_levels_in_order(raw in prop::collection::vec(-4i32..260, 0..32)) {
        let filtered = qos_list(&raw);
        let expected: Vec<QoS> = raw
            .iter()
            .filter(|&&level| (0..=2).contains(&level))
            .map(|&level| QoS::try_from(level).unwrap())
            .collect();
        prop_assert_eq!(&filtered, &expected);
        prop_assert!(filtered.len() <= raw.len());
    }

    /// A SUBACK with a positive count over a valid array always marshals.
    #[test]
    fn prop_granted_qos_from_raw_matches_slice(raw in prop::collection::vec(0i32..3, 1..16)) {
        let count = c_int::try_from(raw.len()).unwrap();
        // SAFETY: `raw` holds `count` readable entries
        let granted = unsafe { granted_qos_from_raw(raw.as_ptr(), count) };
        prop_assert_eq!(granted, Some(qos_list(&raw)));
    }

    /// Unknown log severities never fail; they fall back to `All`.
    #[test]
    fn prop_log_level_lookup_is_total(raw in any::<i32>()) {
        let level = LogLevel::try_from(raw).unwrap_or(LogLevel::All);
        if let Ok(known) = LogLevel::try_from(raw) {
            prop_assert_eq!(known.as_raw(), raw);
        }
        prop_assert!(LogLevel::ALL_LEVELS.contains(&level));
    }

    /// Text payloads survive the copy out of a foreign buffer unchanged.
    #[test]
    fn prop_payload_text_round_trip(text in ".{0,256}") {
        let bytes = text.as_bytes();
        // SAFETY: `bytes` is readable for its length
        let payload = unsafe { Payload::from_raw(bytes.as_ptr().cast(), bytes.len()) };
        prop_assert_eq!(payload.as_str(), Some(text.as_str()));
        prop_assert_eq!(payload.len(), bytes.len());
    }
}
