//! Single-request HTTP transport.
//!
//! [`Transport`] issues exactly one request and buffers the whole response.
//! [`ReqwestTransport`] re-reads the proxy environment per request: with a
//! proxy configured, HTTPS targets are reached through a `CONNECT` tunnel and
//! TLS is negotiated end-to-end over it; otherwise TLS connects directly.
//! Nothing is retried here.

mod proxy;

pub use proxy::{route_for_env, route_from, ProxyConfig, Route, HTTPS_PROXY_ENV, HTTP_PROXY_ENV};
pub use reqwest::Method;

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "tether/0.1";

/// Request body variants used by the core.
#[derive(Clone, Debug)]
pub enum RequestBody {
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded`, used by token endpoints
    Form(Vec<(String, String)>),
}

/// One outbound request.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl TransportRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }
}

/// Fully buffered response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one HTTP request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Network, TLS and proxy failures surface as [`Error::Transport`].
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// reqwest-backed transport with per-request proxy detection.
pub struct ReqwestTransport {
    timeout: Duration,
    /// Client built for the last route seen; rebuilt when the route changes
    cached: Mutex<Option<(Route, Client)>>,
    tunnel_setups: AtomicUsize,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cached: Mutex::new(None),
            tunnel_setups: AtomicUsize::new(0),
        }
    }

    /// Number of tunneled clients configured so far.
    pub fn tunnel_setups(&self) -> usize {
        self.tunnel_setups.load(Ordering::Relaxed)
    }

    /// Returns a client for `route`, reusing the cached one when the route is unchanged.
    pub fn client_for(&self, route: &Route) -> Result<Client> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_route, client)) = cached.as_ref() {
            if cached_route == route {
                return Ok(client.clone());
            }
        }

        let client = self.build_client(route)?;
        *cached = Some((route.clone(), client.clone()));
        Ok(client)
    }

    fn build_client(&self, route: &Route) -> Result<Client> {
        // Ignore reqwest's own system-proxy detection; the route decides.
        let mut builder = Client::builder()
            .no_proxy()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        if let Route::Tunnel(proxy) = route {
            let mut tunnel = reqwest::Proxy::https(proxy.endpoint()).map_err(Error::transport)?;
            if let Some(user) = &proxy.user {
                tunnel = tunnel.basic_auth(user, proxy.password.as_deref().unwrap_or_default());
            }
            builder = builder.proxy(tunnel);
            self.tunnel_setups.fetch_add(1, Ordering::Relaxed);
            debug!(
                proxy_host = %proxy.host,
                proxy_port = proxy.port,
                authenticated = proxy.user.is_some(),
                "Configured CONNECT tunnel"
            );
        }

        builder.build().map_err(Error::transport)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let route = route_for_env()?;
        self.send_via(&route, request).await
    }
}

impl ReqwestTransport {
    /// Sends `request` over an explicit route instead of the proxy environment.
    pub async fn send_via(
        &self,
        route: &Route,
        request: TransportRequest,
    ) -> Result<TransportResponse> {
        let client = self.client_for(route)?;

        debug!(
            method = %request.method,
            url = %request.url,
            tunneled = route.is_tunnel(),
            "Sending upstream request"
        );

        let mut builder = client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Form(fields)) => builder.form(&fields),
            None => builder,
        };

        let response = builder.send().await.map_err(Error::transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(Error::transport)?;

        debug!(status = status, bytes = body.len(), "Upstream response received");

        Ok(TransportResponse { status, body })
    }
}
