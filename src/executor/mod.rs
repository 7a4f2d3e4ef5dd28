//! Authenticated request executor.
//!
//! The facade upstream-data callers use:
//!
//! ```text
//! execute(provider, method, path, body)
//!   │
//!   ├─► TokenManager::get_valid_token ──► attach Bearer / API-key header
//!   ├─► Transport::send
//!   │
//!   ├─ 2xx ──────► UpstreamResponse
//!   ├─ 401 ──────► force_refresh ──► send once more ──► 401 again: AuthenticationFailed
//!   └─ other ────► Error::Upstream (not retried)
//! ```

use crate::config::{AuthScheme, ProviderConfig, ProviderRegistry};
use crate::error::{Error, Result};
use crate::oauth::TokenManager;
use crate::transport::{Method, RequestBody, Transport, TransportRequest, TransportResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const UNAUTHORIZED: u16 = 401;

/// Successful (2xx) upstream response, unmodified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::MalformedResponse(format!("response body: {e}")))
    }
}

/// Issues authenticated upstream calls with a single 401-triggered retry.
pub struct Executor {
    tokens: Arc<TokenManager>,
    transport: Arc<dyn Transport>,
    providers: Arc<ProviderRegistry>,
}

impl Executor {
    pub fn new(
        tokens: Arc<TokenManager>,
        transport: Arc<dyn Transport>,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            tokens,
            transport,
            providers,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Sends `method path` to the provider with its credential attached.
    ///
    /// A 401 on an OAuth provider forces exactly one refresh and one retry. A
    /// 401 on a static-key provider fails immediately since there is nothing
    /// to refresh.
    pub async fn execute(
        &self,
        provider: &str,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<UpstreamResponse> {
        let config = self.providers.get(provider)?;
        let url = config.url_for(path);

        let token = self.tokens.get_valid_token(provider).await?;
        let response = self
            .send(config, method.clone(), &url, &token, body.clone())
            .await?;

        if response.status != UNAUTHORIZED {
            return finish(response);
        }

        if let AuthScheme::ApiKey { .. } = config.auth {
            warn!(provider = %provider, "API key rejected by upstream");
            return Err(Error::AuthenticationFailed {
                provider: provider.to_string(),
            });
        }

        info!(provider = %provider, path = %path, "Upstream returned 401, refreshing token");
        let token = self.tokens.force_refresh(provider).await?;
        let retried = self.send(config, method, &url, &token, body).await?;

        if retried.status == UNAUTHORIZED {
            warn!(provider = %provider, path = %path, "Upstream rejected refreshed token");
            return Err(Error::AuthenticationFailed {
                provider: provider.to_string(),
            });
        }

        finish(retried)
    }

    /// `GET path?query` where `query` is anything `serde_urlencoded` can encode.
    pub async fn get<Q>(&self, provider: &str, path: &str, query: &Q) -> Result<UpstreamResponse>
    where
        Q: Serialize + ?Sized,
    {
        let encoded = serde_urlencoded::to_string(query)
            .map_err(|e| Error::Configuration(format!("unencodable query for {path}: {e}")))?;

        let path = if encoded.is_empty() {
            path.to_string()
        } else if path.contains('?') {
            format!("{path}&{encoded}")
        } else {
            format!("{path}?{encoded}")
        };

        self.execute(provider, Method::GET, &path, None).await
    }

    async fn send(
        &self,
        config: &ProviderConfig,
        method: Method,
        url: &str,
        token: &str,
        body: Option<Value>,
    ) -> Result<TransportResponse> {
        let request = TransportRequest::new(method, url).header("Accept", "application/json");
        let request = match &config.auth {
            AuthScheme::OAuth2 { .. } => request.header("Authorization", format!("Bearer {token}")),
            AuthScheme::ApiKey { header } => request.header(header.as_str(), token),
        };
        let request = match body {
            Some(body) => request.body(RequestBody::Json(body)),
            None => request,
        };

        let response = self.transport.send(request).await?;
        debug!(provider = %config.name, status = response.status, "Upstream call finished");
        Ok(response)
    }
}

fn finish(response: TransportResponse) -> Result<UpstreamResponse> {
    if response.is_success() {
        Ok(UpstreamResponse {
            status: response.status,
            body: response.body,
        })
    } else {
        Err(Error::Upstream {
            status: response.status,
            body: response.body,
        })
    }
}
