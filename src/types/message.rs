use super::{Payload, QoS};
use serde::{Deserialize, Serialize};
use std::ffi::c_int;
use std::fmt;

/// Message identifier assigned by the native library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i32);

impl MessageId {
    pub fn raw(self) -> c_int {
        self.0
    }
}

impl From<c_int> for MessageId {
    fn from(raw: c_int) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message that arrived on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub topic: String,
    pub payload: Payload,
    pub qos: QoS,
    pub retain: bool,
}
