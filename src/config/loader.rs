//! Configuration Loader
//!
//! Environment-aware configuration loading: a base `smosquitto.toml`, an
//! optional `smosquitto.<environment>.toml` overlay next to it, and
//! `SMOSQUITTO_*` environment variables on top (nested keys separated by
//! `__`, e.g. `SMOSQUITTO_BROKER__HOST`).

use super::error::{ConfigResult, ConfigurationError};
use super::ClientConfig;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

const BASE_FILE_STEM: &str = "smosquitto";
const ENV_PREFIX: &str = "SMOSQUITTO";
const ENV_SEPARATOR: &str = "__";

/// Loaded, validated client configuration and where it came from.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: ClientConfig,
    environment: String,
    sources: Vec<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection from the default
    /// directory (`SMOSQUITTO_CONFIG_DIR`, else `./config`).
    pub fn load() -> ConfigResult<Self> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Self> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Self> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);
        let base = config_directory.join(format!("{BASE_FILE_STEM}.toml"));
        if !base.is_file() {
            return Err(ConfigurationError::config_file_not_found(vec![base]));
        }
        let overlay = config_directory.join(format!("{BASE_FILE_STEM}.{environment}.toml"));
        let overlay = overlay.is_file().then_some(overlay);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );
        Self::build(&base, overlay.as_deref(), None, environment)
    }

    /// Load a single explicit file, plus environment variables.
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigurationError::config_file_not_found(vec![
                path.to_path_buf()
            ]));
        }
        Self::build(path, None, None, &Self::detect_environment())
    }

    /// Merge the sources, deserialize and validate.
    ///
    /// `env_vars` replaces the process environment as the variable source.
    fn build(
        base: &Path,
        overlay: Option<&Path>,
        env_vars: Option<HashMap<String, String>>,
        environment: &str,
    ) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::File::from(base).required(true));
        if let Some(overlay) = overlay {
            builder = builder.add_source(::config::File::from(overlay).required(false));
        }
        let built = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env_vars),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(base.display().to_string(), e))?;

        let config: ClientConfig = built
            .try_deserialize()
            .map_err(|e| ConfigurationError::load_error(base.display().to_string(), e))?;
        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&config.sanitized())
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        let mut sources = vec![base.to_path_buf()];
        sources.extend(overlay.map(Path::to_path_buf));
        Ok(Self {
            config,
            environment: environment.to_string(),
            sources,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn into_config(self) -> ClientConfig {
        self.config
    }

    /// Sanitized configuration for debugging output
    pub fn debug_config(&self) -> serde_json::Value {
        self.config.sanitized()
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Files that contributed to the configuration, base first.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Detect current environment from environment variables
    fn detect_environment() -> String {
        crate::logging::get_environment().to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var("SMOSQUITTO_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProtocolVersion, QoS};
    use std::fs;
    use tempfile::TempDir;

    const BASE: &str = r#"
client_id = "gateway"

[broker]
host = "broker.local"
keepalive_seconds = 30

[will]
topic = "status/gateway"
payload = "offline"
qos = "at_least_once"
retain = true
"#;

    fn setup_test_config_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("smosquitto.toml"), BASE).unwrap();
        dir
    }

    #[test]
    fn test_basic_config_loading() {
        let dir = setup_test_config_dir();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        let config = manager.config();

        assert_eq!(manager.environment(), "test");
        assert_eq!(config.client_id.as_deref(), Some("gateway"));
        assert_eq!(config.broker.host, "broker.local");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.keepalive_seconds, 30);
        assert_eq!(config.will.as_ref().unwrap().qos, QoS::AtLeastOnce);
        assert_eq!(manager.sources().len(), 1);
    }

    #[test]
    fn test_environment_specific_overrides() {
        let dir = setup_test_config_dir();
        fs::write(
            dir.path().join("smosquitto.production.toml"),
            "protocol_version = \"v31\"\n[broker]\nport = 8883\n",
        )
        .unwrap();

        let manager = ConfigManager::load_from_directory_with_env(
            Some(dir.path().to_path_buf()),
            "production",
        )
        .unwrap();
        assert_eq!(manager.config().broker.port, 8883);
        assert_eq!(manager.config().broker.host, "broker.local");
        assert_eq!(manager.config().protocol_version, ProtocolVersion::V31);
        assert_eq!(manager.sources().len(), 2);
    }

    #[test]
    fn test_environment_variables_override_files() {
        let dir = setup_test_config_dir();
        let vars = HashMap::from([
            ("SMOSQUITTO_BROKER__HOST".to_string(), "10.0.0.5".to_string()),
            ("SMOSQUITTO_BROKER__PORT".to_string(), "1884".to_string()),
        ]);
        let manager = ConfigManager::build(
            &dir.path().join("smosquitto.toml"),
            None,
            Some(vars),
            "test",
        )
        .unwrap();
        assert_eq!(manager.config().broker.host, "10.0.0.5");
        assert_eq!(manager.config().broker.port, 1884);
    }

    #[test]
    fn test_config_file_not_found() {
        let dir = TempDir::new().unwrap();
        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(
            result,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "clean_session = false\n[broker]\nhost = \"h\"\n").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&path),
            Err(ConfigurationError::ValidationError { .. })
        ));

        fs::write(&path, "[broker\nhost = ").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&path),
            Err(ConfigurationError::LoadError { .. })
        ));
    }
}
