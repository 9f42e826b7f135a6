//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via TESSERA_CONFIG)
//! 3. Environment variables

use crate::connection::{
    TransportConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_READ_BUFFER_SIZE,
};
use crate::tls::TlsClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tessera_protocol::{Credentials, DEFAULT_PORT};

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Where and how to connect.
    pub connection: ConnectionSettings,
    /// TLS configuration.
    pub tls: TlsClientConfig,
    /// Account every request runs as.
    pub credentials: Credentials,
    /// Store addressed by requests.
    pub store: String,
    /// Namespace within the store.
    pub namespace: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            tls: TlsClientConfig::default(),
            credentials: Credentials::default(),
            store: "default".to_string(),
            namespace: None,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("TESSERA_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `TESSERA_*` overrides looked up through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("TESSERA_HOST") {
            self.connection.host = host;
        }
        if let Some(port) = lookup("TESSERA_PORT").and_then(|v| v.parse().ok()) {
            self.connection.port = port;
        }
        if let Some(secs) = lookup("TESSERA_IDLE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.connection.idle_timeout_secs = secs;
        }
        if let Some(secs) = lookup("TESSERA_HANDSHAKE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.connection.handshake_timeout_secs = secs;
        }
        if let Some(username) = lookup("TESSERA_USERNAME") {
            self.credentials.username = username;
        }
        if let Some(password) = lookup("TESSERA_PASSWORD") {
            self.credentials.password = password;
        }
        if let Some(store) = lookup("TESSERA_STORE") {
            self.store = store;
        }
        if let Some(enabled) = lookup("TESSERA_TLS") {
            self.tls.enabled = is_truthy(&enabled);
        }
        if let Some(path) = lookup("TESSERA_CA_CERT") {
            self.tls.ca_cert_path = Some(PathBuf::from(path));
            self.tls.enabled = true;
        }
        if let Some(insecure) = lookup("TESSERA_INSECURE") {
            self.tls.insecure = is_truthy(&insecure);
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection.validate()?;

        if self.tls.client_cert_path.is_some() != self.tls.client_key_path.is_some() {
            return Err(ConfigError::ValidationError(
                "client_cert_path and client_key_path must be set together".to_string(),
            ));
        }
        if self.store.is_empty() {
            return Err(ConfigError::ValidationError("store is empty".to_string()));
        }

        Ok(())
    }

    /// Builds the transport configuration this client connects with.
    pub fn transport_config(&self) -> TransportConfig {
        let mut config = TransportConfig::new(&self.connection.host, self.connection.port)
            .with_connect_timeout(self.connection.connect_timeout())
            .with_idle_timeout(self.connection.idle_timeout())
            .with_handshake_timeout(self.connection.handshake_timeout())
            .with_read_buffer_size(self.connection.read_buffer_size);
        if self.tls.enabled {
            config = config.with_tls(self.tls.clone());
        }
        config
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Engine host name or address.
    pub host: String,
    /// Engine port.
    pub port: u16,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds.
    pub idle_timeout_secs: u64,
    /// TLS handshake timeout in seconds.
    pub handshake_timeout_secs: u64,
    /// Read buffer size in bytes.
    pub read_buffer_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT.as_secs(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ConnectionSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::ValidationError("host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationError("port must not be 0".to_string()));
        }
        if self.connect_timeout_secs == 0
            || self.idle_timeout_secs == 0
            || self.handshake_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.connection.port, DEFAULT_PORT);
        assert_eq!(config.connection.idle_timeout(), Duration::from_secs(120));
        assert_eq!(config.connection.handshake_timeout(), Duration::from_secs(10));
        assert!(!config.tls.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "connection:\n  host: db.internal\n  port: 7000\n\
             credentials:\n  username: alice\n  password: secret\n\
             store: analytics\n\
             tls:\n  enabled: true\n  insecure: true"
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.port, 7000);
        assert_eq!(config.connection.idle_timeout_secs, 120);
        assert_eq!(config.credentials, Credentials::new("alice", "secret"));
        assert_eq!(config.store, "analytics");
        assert!(config.tls.insecure);

        let transport = config.transport_config();
        assert_eq!(transport.address(), "db.internal:7000");
        assert!(transport.tls.is_some());
    }

    #[test]
    fn test_from_file_errors() {
        let err = ClientConfig::from_file("/nonexistent/tessera.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(..)));
        assert!(err.to_string().contains("failed to read"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connection: [not, a, map]").unwrap();
        let err = ClientConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TESSERA_HOST", "10.0.0.5"),
            ("TESSERA_PORT", "7100"),
            ("TESSERA_IDLE_TIMEOUT", "30"),
            ("TESSERA_USERNAME", "bob"),
            ("TESSERA_STORE", "metrics"),
            ("TESSERA_CA_CERT", "/etc/tessera/ca.pem"),
            ("TESSERA_HANDSHAKE_TIMEOUT", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.connection.host, "10.0.0.5");
        assert_eq!(config.connection.port, 7100);
        assert_eq!(config.connection.idle_timeout_secs, 30);
        assert_eq!(config.connection.handshake_timeout_secs, 10);
        assert_eq!(config.credentials.username, "bob");
        assert_eq!(config.store, "metrics");
        assert!(config.tls.enabled);
        assert_eq!(
            config.tls.ca_cert_path,
            Some(PathBuf::from("/etc/tessera/ca.pem"))
        );
    }

    #[test]
    fn test_validate() {
        let mut config = ClientConfig::default();
        config.connection.port = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.connection.idle_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.tls.client_cert_path = Some("/cert.pem".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("together"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = ClientConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: ClientConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.connection.port, config.connection.port);
        assert_eq!(parsed.store, config.store);
    }
}
