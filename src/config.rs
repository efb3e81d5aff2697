//! Configuration management for the deploytar server
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `DEPLOYTAR_*` environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;

/// Environment variable naming the configuration file (without extension).
pub const CONFIG_PATH_ENV: &str = "DEPLOYTAR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config";
const ENV_PREFIX: &str = "DEPLOYTAR";

/// Server configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// IP address the HTTP listener binds to
    /// Environment: DEPLOYTAR_BIND_ADDRESS
    pub bind_address: String,

    /// Port of the HTTP listener
    /// Environment: DEPLOYTAR_HTTP_PORT
    pub http_port: u16,

    /// Port of the gRPC listener
    /// Environment: DEPLOYTAR_GRPC_PORT
    pub grpc_port: u16,

    /// Directory all listings and uploads are confined to. Empty means the
    /// working directory, without restriction on absolute paths inside it.
    /// Environment: DEPLOYTAR_PATH_PREFIX
    #[serde(default)]
    pub path_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 8080,
            grpc_port: 9090,
            path_prefix: String::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the file named by `DEPLOYTAR_CONFIG` (default
    /// `config.toml`) with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from `path`; a missing file is not an error
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("http_port", i64::from(defaults.http_port))?
            .set_default("grpc_port", i64::from(defaults.grpc_port))?
            .set_default("path_prefix", defaults.path_prefix)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.http_port == 0 {
            return Err(config::ConfigError::Message(
                "http_port cannot be 0".into(),
            ));
        }

        if self.grpc_port == 0 {
            return Err(config::ConfigError::Message(
                "grpc_port cannot be 0".into(),
            ));
        }

        if self.http_port == self.grpc_port {
            return Err(config::ConfigError::Message(format!(
                "http_port and grpc_port must differ (both are {})",
                self.http_port
            )));
        }

        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as socket address
    pub fn http_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.http_port)
    }

    /// Socket address of the gRPC listener
    pub fn grpc_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.grpc_port)
    }

    /// The configured prefix, if any
    pub fn path_prefix(&self) -> Option<&str> {
        let prefix = self.path_prefix.trim();
        (!prefix.is_empty()).then_some(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");

        let config = ServerConfig::load_from(path.to_str().unwrap()).unwrap();

        assert_eq!(config.http_port, 8080);
        assert_eq!(config.grpc_port, 9090);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.path_prefix(), None);
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploytar.toml");
        fs::write(
            &path,
            "bind_address = \"127.0.0.1\"\n\
             http_port = 9000\n\
             grpc_port = 9001\n\
             path_prefix = \"/srv/www\"\n",
        )
        .unwrap();

        let config = ServerConfig::load_from(path.to_str().unwrap()).unwrap();

        assert_eq!(config.http_socket(), "127.0.0.1:9000");
        assert_eq!(config.grpc_socket(), "127.0.0.1:9001");
        assert_eq!(config.path_prefix(), Some("/srv/www"));
    }

    #[test]
    fn test_zero_port_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "http_port = 0\n").unwrap();

        assert!(ServerConfig::load_from(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_shared_port_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clash.toml");
        fs::write(&path, "http_port = 7000\ngrpc_port = 7000\n").unwrap();

        assert!(ServerConfig::load_from(path.to_str().unwrap()).is_err());
    }
}
