use super::{Client, Library};
use crate::config::{BrokerConfig, ClientConfig};
use crate::error::{MosquittoError, MosquittoResult};
use std::time::Duration;
use tracing::{debug, error};

impl Client {
    /// Create a client and apply every setting of `config`, without
    /// connecting.
    pub fn from_config(library: &Library, config: &ClientConfig) -> MosquittoResult<Self> {
        if let Err(config_error) = config.validate() {
            error!(error = %config_error, "Rejecting invalid client configuration");
            return Err(MosquittoError::Inval);
        }
        let client = Self::new(library, config.client_id.as_deref(), config.clean_session)?;
        client.apply_config(config)?;
        debug!(handle = %client.handle(), config = %config.sanitized(), "Client configured");
        Ok(client)
    }

    fn apply_config(&self, config: &ClientConfig) -> MosquittoResult<()> {
        self.set_protocol_version(config.protocol_version)?;
        if let Some(credentials) = &config.credentials {
            self.set_login_information(
                Some(&credentials.username),
                credentials.password.as_deref(),
            )?;
        }
        if let Some(reconnect) = &config.reconnect {
            self.set_reconnect_delay(
                Duration::from_secs(reconnect.delay_seconds),
                Duration::from_secs(reconnect.max_delay_seconds),
                reconnect.exponential_backoff,
            )?;
        }
        if let Some(max_inflight) = config.max_inflight_messages {
            self.set_max_inflight_messages(max_inflight)?;
        }
        if config.threaded {
            self.set_threaded(true)?;
        }
        if let Some(socks5) = &config.socks5 {
            self.set_socks5(
                &socks5.host,
                socks5.port,
                socks5.username.as_deref(),
                socks5.password.as_deref(),
            )?;
        }
        if let Some(tls) = &config.tls {
            self.set_tls(&tls.certificates(), tls.key_password.as_deref())?;
            self.set_tls_options(&tls.options())?;
            if tls.insecure {
                self.set_tls_insecure(true)?;
            }
        }
        if let Some(will) = &config.will {
            self.set_will(&will.topic, will.payload.as_bytes(), will.qos, will.retain)?;
        }
        Ok(())
    }

    /// Connect using the broker section of a configuration.
    pub fn connect_with(&self, broker: &BrokerConfig) -> MosquittoResult<()> {
        self.connect(
            &broker.host,
            broker.port,
            broker.keepalive_seconds,
            broker.bind_address.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialsConfig, ReconnectConfig, TlsConfig, WillConfig};
    use crate::engine::LoopbackEngine;
    use crate::types::QoS;
    use std::path::PathBuf;

    #[test]
    fn test_from_config_applies_settings() {
        let engine = LoopbackEngine::new();
        let library = Library::init(engine.clone()).unwrap();
        let config = ClientConfig {
            client_id: Some("configured".to_string()),
            credentials: Some(CredentialsConfig {
                username: "device".to_string(),
                password: Some("secret".to_string()),
            }),
            reconnect: Some(ReconnectConfig {
                delay_seconds: 2,
                max_delay_seconds: 30,
                exponential_backoff: true,
            }),
            max_inflight_messages: Some(5),
            will: Some(WillConfig {
                topic: "status/configured".to_string(),
                payload: "offline".to_string(),
                qos: QoS::AtLeastOnce,
                retain: true,
            }),
            ..ClientConfig::default()
        };

        let client = Client::from_config(&library, &config).unwrap();
        let session = engine.session(client.handle()).unwrap();
        assert_eq!(session.client_id, "configured");
        assert_eq!(session.username.as_deref(), Some("device"));
        assert_eq!(session.password.as_deref(), Some("secret"));
        assert_eq!(session.reconnect_delay, (2, 30, true));
        assert_eq!(session.max_inflight, 5);
        assert_eq!(session.protocol_version, 4);
        assert_eq!(session.will.unwrap().payload.as_str(), Some("offline"));
        assert!(!session.connected);

        client.connect_with(&config.broker).unwrap();
        let session = engine.session(client.handle()).unwrap();
        assert!(session.connected);
        assert_eq!(session.endpoint.unwrap().port, 1883);
    }

    #[test]
    fn test_invalid_config_creates_no_handle() {
        let engine = LoopbackEngine::new();
        let library = Library::init(engine.clone()).unwrap();
        let config = ClientConfig {
            tls: Some(TlsConfig {
                certfile: Some(PathBuf::from("client.pem")),
                ..TlsConfig::default()
            }),
            ..ClientConfig::default()
        };
        assert_eq!(
            Client::from_config(&library, &config).unwrap_err(),
            MosquittoError::Inval
        );
        assert_eq!(engine.session_count(), 0);
    }
}
