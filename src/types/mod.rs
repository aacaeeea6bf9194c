//! # Domain Value Types
//!
//! Immutable values handed to the application: quality-of-service levels,
//! messages and their payloads, connection outcomes, log severities, version
//! information and TLS options. None of them hold on to foreign memory.

pub mod connection;
pub mod log_level;
pub mod message;
pub mod payload;
pub mod protocol;
pub mod qos;
pub mod tls;
pub mod version;

pub use connection::{ConnectionResponseCode, DisconnectReason};
pub use log_level::LogLevel;
pub use message::{Message, MessageId};
pub use payload::Payload;
pub use protocol::{ProtocolVersion, Timeout};
pub use qos::QoS;
pub use tls::{CertificateRequirements, TlsCertificates, TlsOptions, TlsVersion};
pub use version::Version;
