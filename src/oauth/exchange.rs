//! OAuth token endpoint exchanges.
//!
//! Handles the refresh-token grant and the authorization-code grant.

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::transport::{Method, RequestBody, Transport, TransportRequest};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Longest token lifetime accepted from a token endpoint (100 years).
const MAX_EXPIRES_IN: i64 = 100 * 365 * 24 * 60 * 60;

/// Client identity at a token endpoint.
#[derive(Clone, Copy, Debug)]
pub struct TokenEndpoint<'a> {
    pub token_url: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
pub(crate) struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Converts to credentials expiring `expires_in` seconds after `now`.
    ///
    /// Keeps `previous_refresh` when the provider did not rotate the refresh token.
    pub(crate) fn into_credentials(
        self,
        now: DateTime<Utc>,
        previous_refresh: Option<String>,
    ) -> Result<Credentials> {
        let expires_at = Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| out_of_range(self.expires_in))?;

        Ok(Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Some(expires_at),
        })
    }
}

/// Exchanges a refresh token for new credentials.
pub async fn refresh_token(
    transport: &dyn Transport,
    endpoint: TokenEndpoint<'_>,
    refresh_token: &str,
) -> Result<Credentials> {
    let form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", endpoint.client_id),
        ("client_secret", endpoint.client_secret),
    ];

    tracing::debug!("Refreshing token at {}", endpoint.token_url);

    let response = post_form(transport, endpoint.token_url, &form).await?;
    response.into_credentials(Utc::now(), Some(refresh_token.to_string()))
}

/// Exchanges an authorization code for credentials.
pub async fn exchange_code(
    transport: &dyn Transport,
    endpoint: TokenEndpoint<'_>,
    code: &str,
    redirect_uri: &str,
) -> Result<Credentials> {
    let form = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", endpoint.client_id),
        ("client_secret", endpoint.client_secret),
    ];

    tracing::debug!("Exchanging authorization code at {}", endpoint.token_url);

    let response = post_form(transport, endpoint.token_url, &form).await?;
    response.into_credentials(Utc::now(), None)
}

async fn post_form(
    transport: &dyn Transport,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    let fields = form
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let request = TransportRequest::new(Method::POST, token_url)
        .header("Accept", "application/json")
        .body(RequestBody::Form(fields));

    let response = transport.send(request).await?;
    if !response.is_success() {
        return Err(Error::RefreshFailed {
            status: response.status,
            body: response.body,
        });
    }

    let parsed = parse_token_response(&response.body)?;
    tracing::debug!(
        has_refresh_token = parsed.refresh_token.is_some(),
        expires_in = parsed.expires_in,
        token_type = ?parsed.token_type,
        scope = ?parsed.scope,
        "Token exchange successful"
    );
    Ok(parsed)
}

pub(crate) fn parse_token_response(body: &str) -> Result<TokenResponse> {
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("token response: {e}")))?;

    if parsed.access_token.is_empty() {
        return Err(Error::MalformedResponse(
            "token response: empty access_token".to_string(),
        ));
    }
    if parsed.expires_in <= 0 {
        return Err(Error::MalformedResponse(format!(
            "token response: non-positive expires_in {}",
            parsed.expires_in
        )));
    }
    if parsed.expires_in > MAX_EXPIRES_IN {
        return Err(out_of_range(parsed.expires_in));
    }
    Ok(parsed)
}

fn out_of_range(expires_in: i64) -> Error {
    Error::MalformedResponse(format!("token response: expires_in {expires_in} out of range"))
}
