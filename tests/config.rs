//! Loading a configuration from disk and applying it to a client.

mod common;

use common::{loopback_library, pump};
use smosquitto::{Client, ConfigManager, ConfigurationError, Event, MosquittoError, QoS};
use std::fs;
use tempfile::TempDir;

const GATEWAY: &str = r#"
client_id = "gateway"
clean_session = false
max_inflight_messages = 10
protocol_version = "v311"

[broker]
host = "broker.local"
port = 1884
keepalive_seconds = 45

[credentials]
username = "gateway"
password = "hunter2"

[reconnect]
delay_seconds = 1
max_delay_seconds = 32
exponential_backoff = true

[will]
topic = "status/gateway"
payload = "offline"
qos = "at_least_once"
"#;

fn write_config(contents: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("smosquitto.toml"), contents).unwrap();
    dir
}

#[test]
fn test_loaded_configuration_drives_a_client() {
    let dir = write_config(GATEWAY);
    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
            .unwrap();
    let config = manager.config();

    let (engine, library) = loopback_library();
    let client = Client::from_config(&library, config).unwrap();
    let events = client.events();
    client.connect_with(&config.broker).unwrap();
    assert_eq!(pump(&client, &events).len(), 1);

    let session = engine.session(client.handle()).unwrap();
    assert_eq!(session.client_id, "gateway");
    assert!(!session.clean_session);
    assert_eq!(session.max_inflight, 10);
    assert_eq!(session.reconnect_delay, (1, 32, true));
    assert_eq!(session.username.as_deref(), Some("gateway"));
    let will = session.will.unwrap();
    assert_eq!(will.topic, "status/gateway");
    assert_eq!(will.qos, QoS::AtLeastOnce);
    let endpoint = session.endpoint.unwrap();
    assert_eq!(endpoint.host, "broker.local");
    assert_eq!(endpoint.port, 1884);
    assert_eq!(endpoint.keepalive, 45);
}

#[test]
fn test_debug_output_never_contains_secrets() {
    let dir = write_config(GATEWAY);
    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
            .unwrap();
    let debug = manager.debug_config().to_string();
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("[MASKED]"));
}

#[test]
fn test_overlay_for_environment() {
    let dir = write_config(GATEWAY);
    fs::write(
        dir.path().join("smosquitto.staging.toml"),
        "[broker]\nhost = \"staging.local\"\n",
    )
    .unwrap();

    let staging =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "staging")
            .unwrap();
    assert_eq!(staging.config().broker.host, "staging.local");
    assert_eq!(staging.config().broker.port, 1884);
    assert_eq!(staging.sources().len(), 2);

    let other =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "other")
            .unwrap();
    assert_eq!(other.config().broker.host, "broker.local");
}

#[test]
fn test_tls_section_with_missing_files_fails_at_apply_time() {
    let dir = write_config(
        r#"
client_id = "secure"

[tls]
cafile = "/nonexistent/ca.pem"
tls_version = "v1_2"
"#,
    );
    let config = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
        .unwrap()
        .into_config();

    let (engine, library) = loopback_library();
    assert_eq!(
        Client::from_config(&library, &config).unwrap_err(),
        MosquittoError::Inval
    );
    assert_eq!(engine.session_count(), 0);
}

#[test]
fn test_validation_errors_surface_from_loader() {
    let dir = write_config("[broker]\nport = 0\n");
    assert!(matches!(
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test"),
        Err(ConfigurationError::InvalidValue { .. })
    ));
}

#[test]
fn test_configured_client_exchanges_messages() {
    let dir = write_config("client_id = \"echo\"\n");
    let config = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
        .unwrap()
        .into_config();

    let (_engine, library) = loopback_library();
    let client = Client::from_config(&library, &config).unwrap();
    let events = client.events();
    client.connect_with(&config.broker).unwrap();
    client.subscribe("echo", QoS::AtMostOnce).unwrap();
    client.publish("echo", "ping", QoS::AtMostOnce, false).unwrap();

    let received = pump(&client, &events);
    assert!(received.iter().any(|event| matches!(
        event,
        Event::Message(message) if message.payload.as_str() == Some("ping")
    )));
}
