use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verification the client imposes on the server certificate.
///
/// `Peer` is the default and the only value that provides security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum CertificateRequirements {
    /// The server will not be verified in any way.
    None = 0,
    /// The server certificate is verified and the connection aborted on failure.
    #[default]
    Peer = 1,
}

/// TLS protocol version requested from the native library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsVersion {
    V1,
    V1_1,
    #[default]
    V1_2,
    /// Passed through verbatim, e.g. `"tlsv1.3"` on newer libraries.
    Raw(String),
}

impl TlsVersion {
    pub fn as_native(&self) -> &str {
        match self {
            Self::V1 => "tlsv1",
            Self::V1_1 => "tlsv1.1",
            Self::V1_2 => "tlsv1.2",
            Self::Raw(raw) => raw,
        }
    }
}

/// Arguments of `mosquitto_tls_opts_set`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TlsOptions {
    #[serde(default)]
    pub certificate_requirements: CertificateRequirements,
    #[serde(default)]
    pub tls_version: TlsVersion,
    /// OpenSSL cipher list; `None` uses the library default.
    #[serde(default)]
    pub ciphers: Option<String>,
}

/// Certificate locations for `mosquitto_tls_set`.
///
/// Either `cafile` or `capath` must be set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TlsCertificates {
    pub cafile: Option<PathBuf>,
    pub capath: Option<PathBuf>,
    pub certfile: Option<PathBuf>,
    pub keyfile: Option<PathBuf>,
}
