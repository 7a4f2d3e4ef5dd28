//! Wires the core components together from configuration.

use std::sync::Arc;
use tether::config::{ProviderRegistry, TetherConfig};
use tether::credentials::{CredentialStore, MasterKey};
use tether::executor::Executor;
use tether::oauth::TokenManager;
use tether::transport::{ReqwestTransport, Transport};
use tracing::info;

/// Shared handles to the assembled client core.
pub struct Stack {
    pub store: Arc<CredentialStore>,
    pub providers: Arc<ProviderRegistry>,
    pub tokens: Arc<TokenManager>,
    pub executor: Arc<Executor>,
}

impl Stack {
    /// Opens the credential database and builds the token manager and executor.
    pub fn open(config: &TetherConfig, key: MasterKey) -> tether::Result<Self> {
        let providers = Arc::new(ProviderRegistry::from_config(config));
        Self::open_with(config, key, providers)
    }

    /// Same as [`open`](Self::open) with an explicit provider registry.
    pub fn open_with(
        config: &TetherConfig,
        key: MasterKey,
        providers: Arc<ProviderRegistry>,
    ) -> tether::Result<Self> {
        let store = Arc::new(CredentialStore::open(&config.storage.database_path, key)?);
        info!(path = %config.storage.database_path, "Credential store opened");

        let transport: Arc<dyn Transport> =
            Arc::new(ReqwestTransport::new(config.transport.request_timeout()));
        let tokens = Arc::new(
            TokenManager::new(
                Arc::clone(&store),
                Arc::clone(&transport),
                Arc::clone(&providers),
            )
            .with_refresh_margin(config.oauth.refresh_margin()),
        );
        let executor = Arc::new(Executor::new(
            Arc::clone(&tokens),
            transport,
            Arc::clone(&providers),
        ));

        Ok(Self {
            store,
            providers,
            tokens,
            executor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TetherConfig::default();
        config.storage.database_path = dir
            .path()
            .join("credentials.db")
            .to_string_lossy()
            .into_owned();

        let stack = Stack::open_with(
            &config,
            MasterKey::from_bytes([2u8; 32]),
            Arc::new(ProviderRegistry::from_config_with(&config, |_| None)),
        )
        .unwrap();
        stack.store.store_api_key("limitless", "k").unwrap();

        assert!(dir.path().join("credentials.db").exists());
        assert_eq!(stack.providers.names(), vec!["limitless", "whoop"]);
    }
}
