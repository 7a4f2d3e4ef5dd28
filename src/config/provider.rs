//! Upstream provider configurations.
//!
//! Each provider authenticates either with OAuth 2.0 (bearer token that is
//! refreshed) or with a static API key sent in a provider-specific header.

use super::{ProviderOverride, TetherConfig};
use crate::error::{Error, Result};
use std::collections::HashMap;

pub const WHOOP: &str = "whoop";
pub const LIMITLESS: &str = "limitless";

const WHOOP_BASE_URL: &str = "https://api.prod.whoop.com/developer";
const WHOOP_TOKEN_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/token";
const LIMITLESS_BASE_URL: &str = "https://api.limitless.ai";
const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// How requests to a provider are authenticated. Never both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`, refreshed at the token endpoint.
    OAuth2 {
        token_url: String,
        client_id: String,
        client_secret: String,
    },
    /// Static key sent as `<header>: <key>`; never refreshed.
    ApiKey { header: String },
}

/// Provider configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Provider identifier (credential store key)
    pub name: String,

    /// API base URL; request paths are appended to it
    pub base_url: String,

    pub auth: AuthScheme,
}

impl ProviderConfig {
    /// Joins the base URL and a request path.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn is_oauth(&self) -> bool {
        matches!(self.auth, AuthScheme::OAuth2 { .. })
    }
}

/// Lookup table of configured providers.
#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from the built-in providers plus config overrides.
    ///
    /// OAuth client credentials are read from `<PROVIDER>_CLIENT_ID` and
    /// `<PROVIDER>_CLIENT_SECRET`.
    pub fn from_config(config: &TetherConfig) -> Self {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    /// Same as [`from_config`](Self::from_config) with an injectable variable lookup.
    pub fn from_config_with<F>(config: &TetherConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut registry = Self::new();

        let whoop_prefix = WHOOP.to_uppercase();
        registry.insert(ProviderConfig {
            name: WHOOP.to_string(),
            base_url: WHOOP_BASE_URL.to_string(),
            auth: AuthScheme::OAuth2 {
                token_url: WHOOP_TOKEN_URL.to_string(),
                client_id: lookup(&format!("{whoop_prefix}_CLIENT_ID")).unwrap_or_default(),
                client_secret: lookup(&format!("{whoop_prefix}_CLIENT_SECRET"))
                    .unwrap_or_default(),
            },
        });
        registry.insert(ProviderConfig {
            name: LIMITLESS.to_string(),
            base_url: LIMITLESS_BASE_URL.to_string(),
            auth: AuthScheme::ApiKey {
                header: DEFAULT_API_KEY_HEADER.to_string(),
            },
        });

        for (name, overrides) in &config.providers {
            registry.apply_override(name, overrides, &lookup);
        }

        registry
    }

    fn apply_override<F>(&mut self, name: &str, overrides: &ProviderOverride, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = name.to_uppercase();
        let entry = self
            .providers
            .entry(name.to_string())
            .or_insert_with(|| ProviderConfig {
                name: name.to_string(),
                base_url: String::new(),
                auth: AuthScheme::ApiKey {
                    header: DEFAULT_API_KEY_HEADER.to_string(),
                },
            });

        if let Some(base_url) = &overrides.base_url {
            entry.base_url = base_url.clone();
        }

        if let Some(header) = &overrides.api_key_header {
            entry.auth = AuthScheme::ApiKey {
                header: header.clone(),
            };
        } else if let Some(url) = &overrides.token_url {
            let (client_id, client_secret) = match &entry.auth {
                AuthScheme::OAuth2 {
                    client_id,
                    client_secret,
                    ..
                } => (client_id.clone(), client_secret.clone()),
                AuthScheme::ApiKey { .. } => (
                    lookup(&format!("{prefix}_CLIENT_ID")).unwrap_or_default(),
                    lookup(&format!("{prefix}_CLIENT_SECRET")).unwrap_or_default(),
                ),
            };
            entry.auth = AuthScheme::OAuth2 {
                token_url: url.clone(),
                client_id,
                client_secret,
            };
        }
    }

    pub fn insert(&mut self, provider: ProviderConfig) {
        self.providers.insert(provider.name.clone(), provider);
    }

    /// Returns the provider or a configuration error naming it.
    pub fn get(&self, name: &str) -> Result<&ProviderConfig> {
        self.providers
            .get(name)
            .ok_or_else(|| Error::Configuration(format!("unknown provider '{name}'")))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
