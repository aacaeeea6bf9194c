use serde::{Deserialize, Serialize};
use std::ffi::c_int;
use std::fmt;

/// MQTT quality-of-service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QoS {
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

impl TryFrom<c_int> for QoS {
    type Error = c_int;

    /// Fails with the rejected raw value.
    fn try_from(raw: c_int) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(other),
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}
