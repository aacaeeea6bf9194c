use crate::error::MosquittoError;
use std::ffi::c_int;
use std::fmt;

/// CONNACK return code delivered to the connect handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionResponseCode {
    Success,
    UnacceptableProtocolVersion,
    IdentifierRejected,
    BrokerUnavailable,
    /// Broker-specific code outside the documented range.
    Unknown(i32),
}

impl ConnectionResponseCode {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<c_int> for ConnectionResponseCode {
    fn from(code: c_int) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::BrokerUnavailable,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ConnectionResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "connection accepted"),
            Self::UnacceptableProtocolVersion => {
                write!(f, "connection refused: unacceptable protocol version")
            }
            Self::IdentifierRejected => write!(f, "connection refused: identifier rejected"),
            Self::BrokerUnavailable => write!(f, "connection refused: broker unavailable"),
            Self::Unknown(code) => write!(f, "connection refused: unknown reason ({code})"),
        }
    }
}

/// Why the connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The client called `disconnect`.
    UserInitiated,
    Error(MosquittoError),
}

impl From<c_int> for DisconnectReason {
    fn from(rc: c_int) -> Self {
        match MosquittoError::from_code(rc) {
            None => Self::UserInitiated,
            Some(error) => Self::Error(error),
        }
    }
}
