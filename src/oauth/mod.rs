//! OAuth 2.0 token lifecycle.
//!
//! [`TokenManager`] hands out access tokens with at least the configured
//! margin (60 seconds by default) of remaining validity, refreshing them at
//! the provider's token endpoint when needed.
//!
//! # Single-flight refresh
//!
//! ```text
//! caller A ──┐
//! caller B ──┼──► in_flight[provider] ──► spawned refresh task ──► token endpoint
//! caller C ──┘        (one slot)              │
//!                                             ├─► persist to CredentialStore
//!                                             └─► clear slot, resolve shared future
//! ```
//!
//! At most one refresh per provider is in flight. Every caller that needs a
//! refresh while one is running awaits the same shared future and receives the
//! identical outcome. The refresh runs in its own task, so a caller that gives
//! up waiting only detaches itself.

mod exchange;

pub use exchange::TokenEndpoint;

use crate::config::{AuthScheme, ProviderRegistry};
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{Error, Result};
use crate::transport::Transport;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default minimum remaining validity of a handed-out token.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

type SharedRefresh = Shared<BoxFuture<'static, Result<Credentials>>>;

/// One in-flight refresh for a provider.
struct InFlight {
    id: u64,
    /// Forced flights always exchange; others may reuse a token stored meanwhile.
    forced: bool,
    future: SharedRefresh,
}

/// Issues valid access tokens and deduplicates concurrent refreshes.
pub struct TokenManager {
    store: Arc<CredentialStore>,
    transport: Arc<dyn Transport>,
    providers: Arc<ProviderRegistry>,
    margin: chrono::Duration,
    in_flight: Arc<DashMap<String, InFlight>>,
    next_flight_id: AtomicU64,
}

impl TokenManager {
    pub fn new(
        store: Arc<CredentialStore>,
        transport: Arc<dyn Transport>,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            store,
            transport,
            providers,
            margin: to_chrono(DEFAULT_REFRESH_MARGIN),
            in_flight: Arc::new(DashMap::new()),
            next_flight_id: AtomicU64::new(0),
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.margin = to_chrono(margin);
        self
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Number of refreshes currently in flight across all providers.
    pub fn refreshes_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns an access token valid for at least the refresh margin.
    ///
    /// The one exception is a provider that issues tokens shorter than the
    /// margin: the fresh token is returned with a warning.
    ///
    /// # Errors
    /// - [`Error::NoCredential`] if nothing is stored (no network call)
    /// - [`Error::ReauthRequired`] if a refresh is needed but no refresh token
    ///   is stored (no network call)
    /// - [`Error::RefreshFailed`] if the token endpoint rejects the refresh
    pub async fn get_valid_token(&self, provider: &str) -> Result<String> {
        let credentials = self.load_required(provider)?;

        if !credentials.needs_refresh(Utc::now(), self.margin) {
            return Ok(credentials.access_token);
        }

        if credentials.refresh_token.is_none() {
            warn!(provider = %provider, "Token expiring and no refresh token stored");
            return Err(Error::ReauthRequired {
                provider: provider.to_string(),
            });
        }

        debug!(provider = %provider, "Token within refresh margin");
        let (flight, _) = self.join_refresh(provider, false);
        let fresh = flight.await?;
        Ok(fresh.access_token)
    }

    /// Refreshes regardless of the stored expiry.
    ///
    /// Used after an upstream 401, which can mean server-side revocation of a
    /// token that still looks valid locally.
    pub async fn force_refresh(&self, provider: &str) -> Result<String> {
        let credentials = self.load_required(provider)?;

        if credentials.refresh_token.is_none() {
            return Err(Error::ReauthRequired {
                provider: provider.to_string(),
            });
        }

        info!(provider = %provider, "Forcing token refresh");
        let rejected = credentials.access_token;
        loop {
            let (flight, forced) = self.join_refresh(provider, true);
            let fresh = flight.await?;
            // A non-forced flight may hand back the token that was just rejected.
            if forced || fresh.access_token != rejected {
                return Ok(fresh.access_token);
            }
            debug!(provider = %provider, "Joined refresh returned the rejected token, retrying forced");
        }
    }

    /// Exchanges an authorization code from the interactive flow and stores
    /// the resulting credentials, replacing any previous ones.
    pub async fn exchange_code(
        &self,
        provider: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credentials> {
        let config = self.providers.get(provider)?;
        let endpoint = oauth_endpoint(provider, &config.auth)?;

        let credentials =
            exchange::exchange_code(self.transport.as_ref(), endpoint, code, redirect_uri).await?;
        self.store.store_credentials(provider, &credentials)?;

        info!(
            provider = %provider,
            has_refresh_token = credentials.refresh_token.is_some(),
            "Authorization code exchanged"
        );
        Ok(credentials)
    }

    fn load_required(&self, provider: &str) -> Result<Credentials> {
        self.store
            .load(provider)?
            .ok_or_else(|| Error::NoCredential {
                provider: provider.to_string(),
            })
    }

    /// Returns the provider's in-flight refresh, starting one if none exists,
    /// along with whether that flight is forced.
    ///
    /// The shard lock is released on return, before anyone awaits the flight.
    fn join_refresh(&self, provider: &str, forced: bool) -> (SharedRefresh, bool) {
        match self.in_flight.entry(provider.to_string()) {
            Entry::Occupied(slot) => {
                debug!(provider = %provider, "Joining in-flight refresh");
                let flight = slot.get();
                (flight.future.clone(), flight.forced)
            }
            Entry::Vacant(slot) => {
                let id = self.next_flight_id.fetch_add(1, Ordering::Relaxed);
                let future = self.spawn_refresh(provider, id, forced);
                slot.insert(InFlight {
                    id,
                    forced,
                    future: future.clone(),
                });
                (future, forced)
            }
        }
    }

    fn spawn_refresh(&self, provider: &str, id: u64, forced: bool) -> SharedRefresh {
        let flight = RefreshFlight {
            provider: provider.to_string(),
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            providers: Arc::clone(&self.providers),
            margin: self.margin,
        };
        let in_flight = Arc::clone(&self.in_flight);

        let handle = tokio::spawn(async move {
            let outcome = flight.run(forced).await;
            in_flight.remove_if(&flight.provider, |_, slot| slot.id == id);
            outcome
        });

        async move { handle.await.unwrap_or_else(|e| Err(Error::transport(e))) }
            .boxed()
            .shared()
    }
}

/// Everything a spawned refresh needs, detached from any caller.
struct RefreshFlight {
    provider: String,
    store: Arc<CredentialStore>,
    transport: Arc<dyn Transport>,
    providers: Arc<ProviderRegistry>,
    margin: chrono::Duration,
}

impl RefreshFlight {
    async fn run(&self, forced: bool) -> Result<Credentials> {
        let config = self.providers.get(&self.provider)?;
        let endpoint = oauth_endpoint(&self.provider, &config.auth)?;

        // Re-read: a flight that finished just before this one may already
        // have stored a fresh token.
        let current = self
            .store
            .load(&self.provider)?
            .ok_or_else(|| Error::NoCredential {
                provider: self.provider.clone(),
            })?;
        if !forced && !current.needs_refresh(Utc::now(), self.margin) {
            debug!(provider = %self.provider, "Token already refreshed, skipping exchange");
            return Ok(current);
        }

        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::ReauthRequired {
                provider: self.provider.clone(),
            })?;

        info!(provider = %self.provider, forced = forced, "Refreshing OAuth token");

        let fresh = exchange::refresh_token(self.transport.as_ref(), endpoint, refresh_token)
            .await
            .map_err(|e| {
                warn!(provider = %self.provider, error = %e, "Token refresh failed");
                e
            })?;

        self.store.store_credentials(&self.provider, &fresh)?;

        // Handed out anyway; the next call refreshes again.
        if fresh.needs_refresh(Utc::now(), self.margin) {
            warn!(
                provider = %self.provider,
                expires_at = ?fresh.expires_at,
                margin_seconds = self.margin.num_seconds(),
                "Refreshed token expires within the refresh margin"
            );
        }

        info!(
            provider = %self.provider,
            expires_at = ?fresh.expires_at,
            "OAuth token refreshed successfully"
        );
        Ok(fresh)
    }
}

fn oauth_endpoint<'a>(provider: &str, auth: &'a AuthScheme) -> Result<TokenEndpoint<'a>> {
    match auth {
        AuthScheme::OAuth2 {
            token_url,
            client_id,
            client_secret,
        } => Ok(TokenEndpoint {
            token_url,
            client_id,
            client_secret,
        }),
        AuthScheme::ApiKey { .. } => Err(Error::Configuration(format!(
            "provider '{provider}' uses a static API key and has no token endpoint"
        ))),
    }
}

fn to_chrono(margin: Duration) -> chrono::Duration {
    // Bounded so `now + margin` cannot overflow.
    const MAX_MARGIN_SECS: u64 = 365 * 24 * 60 * 60;
    chrono::Duration::seconds(margin.as_secs().min(MAX_MARGIN_SECS) as i64)
}
