//! # Configuration
//!
//! Declarative description of one client, loadable from TOML files and
//! environment variables through [`ConfigManager`], and applied with
//! [`Client::from_config`](crate::Client::from_config).
//!
//! ```toml
//! client_id = "sensor-gateway"
//! clean_session = true
//!
//! [broker]
//! host = "broker.local"
//! port = 8883
//! keepalive_seconds = 30
//!
//! [tls]
//! cafile = "/etc/ssl/certs/ca.pem"
//! tls_version = "v1_2"
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::types::{
    CertificateRequirements, ProtocolVersion, QoS, TlsCertificates, TlsOptions, TlsVersion,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_keepalive() -> u16 {
    60
}

fn default_socks5_port() -> u16 {
    1080
}

/// Complete configuration of one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// `None` lets the library generate an id (requires `clean_session`).
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_true")]
    pub clean_session: bool,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
    #[serde(default)]
    pub reconnect: Option<ReconnectConfig>,
    #[serde(default)]
    pub max_inflight_messages: Option<u32>,
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
    #[serde(default)]
    pub threaded: bool,
    #[serde(default)]
    pub socks5: Option<Socks5Config>,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub will: Option<WillConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_keepalive")]
    pub keepalive_seconds: u16,
    #[serde(default)]
    pub bind_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Automatic reconnect delays used by the library-managed loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    pub delay_seconds: u64,
    pub max_delay_seconds: u64,
    #[serde(default)]
    pub exponential_backoff: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socks5Config {
    pub host: String,
    #[serde(default = "default_socks5_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub cafile: Option<PathBuf>,
    #[serde(default)]
    pub capath: Option<PathBuf>,
    #[serde(default)]
    pub certfile: Option<PathBuf>,
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
    #[serde(default)]
    pub key_password: Option<String>,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub certificate_requirements: CertificateRequirements,
    #[serde(default)]
    pub tls_version: TlsVersion,
    #[serde(default)]
    pub ciphers: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WillConfig {
    pub topic: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub qos: QoS,
    #[serde(default)]
    pub retain: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            clean_session: true,
            broker: BrokerConfig::default(),
            credentials: None,
            reconnect: None,
            max_inflight_messages: None,
            protocol_version: ProtocolVersion::default(),
            threaded: false,
            socks5: None,
            tls: None,
            will: None,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keepalive_seconds: default_keepalive(),
            bind_address: None,
        }
    }
}

impl TlsConfig {
    pub fn certificates(&self) -> TlsCertificates {
        TlsCertificates {
            cafile: self.cafile.clone(),
            capath: self.capath.clone(),
            certfile: self.certfile.clone(),
            keyfile: self.keyfile.clone(),
        }
    }

    pub fn options(&self) -> TlsOptions {
        TlsOptions {
            certificate_requirements: self.certificate_requirements,
            tls_version: self.tls_version.clone(),
            ciphers: self.ciphers.clone(),
        }
    }
}

impl ClientConfig {
    /// Check the settings the native library would reject, before any
    /// foreign call is made.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.broker.host.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "broker.host",
                "broker configuration",
            ));
        }
        if self.broker.port == 0 {
            return Err(ConfigurationError::invalid_value(
                "broker.port",
                "0",
                "port must be between 1 and 65535",
            ));
        }
        if self.client_id.is_none() && !self.clean_session {
            return Err(ConfigurationError::validation_error(
                "a client_id is required when clean_session is false",
            ));
        }
        if let Some(reconnect) = &self.reconnect {
            if reconnect.delay_seconds == 0 {
                return Err(ConfigurationError::invalid_value(
                    "reconnect.delay_seconds",
                    "0",
                    "delay must be at least one second",
                ));
            }
            if reconnect.max_delay_seconds < reconnect.delay_seconds {
                return Err(ConfigurationError::invalid_value(
                    "reconnect.max_delay_seconds",
                    reconnect.max_delay_seconds.to_string(),
                    "must not be smaller than delay_seconds",
                ));
            }
        }
        if let Some(tls) = &self.tls {
            if tls.cafile.is_none() && tls.capath.is_none() {
                return Err(ConfigurationError::missing_required_field(
                    "tls.cafile",
                    "tls configuration (or tls.capath)",
                ));
            }
        }
        if let Some(will) = &self.will {
            if will.topic.is_empty() || will.topic.contains(['+', '#']) {
                return Err(ConfigurationError::invalid_value(
                    "will.topic",
                    will.topic.clone(),
                    "will topic must be non-empty and must not contain wildcards",
                ));
            }
        }
        if let Some(socks5) = &self.socks5 {
            if socks5.host.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "socks5.host",
                    "socks5 configuration",
                ));
            }
        }
        Ok(())
    }

    /// JSON form of the configuration with secrets masked, for logging.
    pub fn sanitized(&self) -> serde_json::Value {
        let mut value = serde_json::json!(self);
        sanitize_json_recursive(&mut value, &["password", "secret", "token"]);
        value
    }
}

fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let is_sensitive = sensitive_patterns
                    .iter()
                    .any(|pattern| key_lower.contains(pattern));

                if !is_sensitive {
                    sanitize_json_recursive(val, sensitive_patterns);
                    continue;
                }
                *val = match val {
                    serde_json::Value::Null => serde_json::Value::Null,
                    serde_json::Value::String(s) if s.is_empty() => {
                        serde_json::Value::String("[EMPTY]".to_string())
                    }
                    _ => serde_json::Value::String("[MASKED]".to_string()),
                };
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                sanitize_json_recursive(item, sensitive_patterns);
            }
        }
        _ => {}
    }
}
