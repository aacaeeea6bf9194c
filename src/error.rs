//! # Error Taxonomy
//!
//! Every foreign call returns an integer result code. Zero is success; every
//! other value maps to exactly one [`MosquittoError`] variant. Codes the
//! native library does not document map to [`MosquittoError::Unknown`]
//! instead of failing closed.

use crate::ffi;
use std::ffi::c_int;
use thiserror::Error;

/// Typed outcome of a failed foreign call.
///
/// Messages match the native `mosquitto_strerror` texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum MosquittoError {
    #[error("Connection pending.")]
    ConnectionPending,
    #[error("Out of memory.")]
    NoMemory,
    #[error("A network protocol error occurred when communicating with the broker.")]
    Protocol,
    #[error("Invalid function arguments provided.")]
    Inval,
    #[error("The client is not currently connected.")]
    NoConnection,
    #[error("The connection was refused.")]
    ConnectionRefused,
    #[error("Message not found (internal error).")]
    NotFound,
    #[error("The connection was lost.")]
    ConnectionLost,
    #[error("A TLS error occurred.")]
    Tls,
    #[error("Payload too large.")]
    PayloadSize,
    #[error("This feature is not supported.")]
    NotSupported,
    #[error("Authorisation failed.")]
    Auth,
    #[error("Access denied by ACL.")]
    AclDenied,
    #[error("Error defined by errno.")]
    Errno,
    #[error("Lookup error.")]
    Eai,
    #[error("Proxy error.")]
    Proxy,
    #[error("Plugin deferred.")]
    PluginDefer,
    #[error("Malformed UTF-8")]
    MalformedUtf8,
    #[error("Keepalive exceeded")]
    Keepalive,
    #[error("DNS Lookup failed")]
    Lookup,
    /// `MOSQ_ERR_UNKNOWN` or any code outside the documented set.
    #[error("Unknown error.")]
    Unknown { code: i32 },
}

/// Result type for facade operations.
pub type MosquittoResult<T> = Result<T, MosquittoError>;

impl MosquittoError {
    /// Map a raw result code. `None` is the success sentinel.
    pub fn from_code(code: c_int) -> Option<Self> {
        let error = match code {
            ffi::MOSQ_ERR_SUCCESS => return None,
            ffi::MOSQ_ERR_CONN_PENDING => Self::ConnectionPending,
            ffi::MOSQ_ERR_NOMEM => Self::NoMemory,
            ffi::MOSQ_ERR_PROTOCOL => Self::Protocol,
            ffi::MOSQ_ERR_INVAL => Self::Inval,
            ffi::MOSQ_ERR_NO_CONN => Self::NoConnection,
            ffi::MOSQ_ERR_CONN_REFUSED => Self::ConnectionRefused,
            ffi::MOSQ_ERR_NOT_FOUND => Self::NotFound,
            ffi::MOSQ_ERR_CONN_LOST => Self::ConnectionLost,
            ffi::MOSQ_ERR_TLS => Self::Tls,
            ffi::MOSQ_ERR_PAYLOAD_SIZE => Self::PayloadSize,
            ffi::MOSQ_ERR_NOT_SUPPORTED => Self::NotSupported,
            ffi::MOSQ_ERR_AUTH => Self::Auth,
            ffi::MOSQ_ERR_ACL_DENIED => Self::AclDenied,
            ffi::MOSQ_ERR_ERRNO => Self::Errno,
            ffi::MOSQ_ERR_EAI => Self::Eai,
            ffi::MOSQ_ERR_PROXY => Self::Proxy,
            ffi::MOSQ_ERR_PLUGIN_DEFER => Self::PluginDefer,
            ffi::MOSQ_ERR_MALFORMED_UTF8 => Self::MalformedUtf8,
            ffi::MOSQ_ERR_KEEPALIVE => Self::Keepalive,
            ffi::MOSQ_ERR_LOOKUP => Self::Lookup,
            other => Self::Unknown { code: other },
        };
        Some(error)
    }

    /// The raw result code this error was mapped from.
    pub fn code(&self) -> c_int {
        match self {
            Self::ConnectionPending => ffi::MOSQ_ERR_CONN_PENDING,
            Self::NoMemory => ffi::MOSQ_ERR_NOMEM,
            Self::Protocol => ffi::MOSQ_ERR_PROTOCOL,
            Self::Inval => ffi::MOSQ_ERR_INVAL,
            Self::NoConnection => ffi::MOSQ_ERR_NO_CONN,
            Self::ConnectionRefused => ffi::MOSQ_ERR_CONN_REFUSED,
            Self::NotFound => ffi::MOSQ_ERR_NOT_FOUND,
            Self::ConnectionLost => ffi::MOSQ_ERR_CONN_LOST,
            Self::Tls => ffi::MOSQ_ERR_TLS,
            Self::PayloadSize => ffi::MOSQ_ERR_PAYLOAD_SIZE,
            Self::NotSupported => ffi::MOSQ_ERR_NOT_SUPPORTED,
            Self::Auth => ffi::MOSQ_ERR_AUTH,
            Self::AclDenied => ffi::MOSQ_ERR_ACL_DENIED,
            Self::Errno => ffi::MOSQ_ERR_ERRNO,
            Self::Eai => ffi::MOSQ_ERR_EAI,
            Self::Proxy => ffi::MOSQ_ERR_PROXY,
            Self::PluginDefer => ffi::MOSQ_ERR_PLUGIN_DEFER,
            Self::MalformedUtf8 => ffi::MOSQ_ERR_MALFORMED_UTF8,
            Self::Keepalive => ffi::MOSQ_ERR_KEEPALIVE,
            Self::Lookup => ffi::MOSQ_ERR_LOOKUP,
            Self::Unknown { code } => *code,
        }
    }

    /// Whether retrying after reconnecting could succeed.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NoConnection | Self::ConnectionLost | Self::ConnectionRefused | Self::Keepalive
        )
    }
}

/// Translate a foreign result code into a typed outcome.
pub fn check_result_code(rc: c_int) -> MosquittoResult<()> {
    match MosquittoError::from_code(rc) {
        None => Ok(()),
        Some(error) => Err(error),
    }
}
