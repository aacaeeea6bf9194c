use crate::ffi;
use serde::{Deserialize, Serialize};
use std::ffi::c_int;
use std::time::Duration;

/// MQTT protocol version spoken to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVersion {
    V31,
    #[default]
    V311,
}

impl ProtocolVersion {
    pub fn as_raw(self) -> c_int {
        match self {
            Self::V31 => ffi::MQTT_PROTOCOL_V31,
            Self::V311 => ffi::MQTT_PROTOCOL_V311,
        }
    }
}

/// How long a loop call may wait for network activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Return immediately.
    Instant,
    /// Let the native library pick its default (one second).
    #[default]
    Default,
    Interval(Duration),
}

impl Timeout {
    /// Milliseconds as the native loop functions expect them.
    pub fn as_millis(self) -> c_int {
        match self {
            Self::Instant => 0,
            Self::Default => -1,
            Self::Interval(interval) => {
                c_int::try_from(interval.as_millis()).unwrap_or(c_int::MAX)
            }
        }
    }
}
