pub mod provider;
pub use provider::{AuthScheme, ProviderConfig, ProviderRegistry, LIMITLESS, WHOOP};

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Complete Tether configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TetherConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    /// Per-provider overrides keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderOverride>,
}

/// Credential database location
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    "credentials.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Token lifecycle settings
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Minimum remaining validity of a handed-out token (seconds)
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_seconds: u64,
}

fn default_refresh_margin() -> u64 {
    60
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            refresh_margin_seconds: default_refresh_margin(),
        }
    }
}

impl OAuthConfig {
    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_seconds)
    }
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Overrides for a built-in provider, or the definition of a new one.
///
/// `api_key_header` switches the provider to static-key auth; `token_url`
/// switches it to OAuth 2.0.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderOverride {
    pub base_url: Option<String>,
    pub token_url: Option<String>,
    pub api_key_header: Option<String>,
}

impl TetherConfig {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Applies `TETHER_CREDENTIALS_DB` and `TETHER_REFRESH_MARGIN_SECONDS` if set.
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("TETHER_CREDENTIALS_DB") {
            if !path.is_empty() {
                self.storage.database_path = path;
            }
        }
        if let Ok(v) = std::env::var("TETHER_REFRESH_MARGIN_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                self.oauth.refresh_margin_seconds = n;
            }
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> Result<TetherConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Configuration(format!("failed to read {path}: {e}")))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Configuration(format!("failed to parse {path}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TetherConfig::default();
        assert_eq!(config.storage.database_path, "credentials.db");
        assert_eq!(config.oauth.refresh_margin_seconds, 60);
        assert_eq!(config.transport.request_timeout_seconds, 30);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [storage]
            database_path = "/var/lib/tether/credentials.db"

            [oauth]
            refresh_margin_seconds = 120

            [transport]
            request_timeout_seconds = 10

            [providers.limitless]
            base_url = "http://localhost:8080"
        "#;

        let config: TetherConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.storage.database_path, "/var/lib/tether/credentials.db");
        assert_eq!(config.oauth.refresh_margin(), Duration::from_secs(120));
        assert_eq!(config.transport.request_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.providers["limitless"].base_url.as_deref(),
            Some("http://localhost:8080")
        );
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [oauth]
            refresh_margin_seconds = 90
        "#;

        let config: TetherConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.oauth.refresh_margin_seconds, 90);
        assert_eq!(config.storage.database_path, "credentials.db");
        assert_eq!(config.transport.request_timeout_seconds, 30);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/tether.toml");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.toml");
        std::fs::write(&path, "[transport]\nrequest_timeout_seconds = 5\n").unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.transport.request_timeout_seconds, 5);
    }
}
