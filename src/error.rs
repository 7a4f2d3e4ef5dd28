//! Error taxonomy for the upstream client core.
//!
//! Every failure a caller can observe is one of these variants. The enum is
//! `Clone` because a single refresh outcome is handed to every caller waiting
//! on the same in-flight exchange.

use std::sync::Arc;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of outcomes surfaced by the credential store, token manager,
/// transport and executor.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed required settings. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No stored credential for the provider; interactive authorization is needed.
    #[error("no stored credential for provider '{provider}'")]
    NoCredential { provider: String },

    /// Refresh is needed but no refresh token is stored.
    #[error("provider '{provider}' requires re-authorization (no refresh token stored)")]
    ReauthRequired { provider: String },

    /// The token endpoint rejected the refresh or code exchange.
    #[error("token endpoint returned status {status}: {body}")]
    RefreshFailed { status: u16, body: String },

    /// A second consecutive 401 after a forced refresh, or a 401 on a static key.
    #[error("authentication failed for provider '{provider}'")]
    AuthenticationFailed { provider: String },

    /// Any other non-2xx upstream response.
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Network, TLS or proxy level failure.
    #[error("transport error: {cause}")]
    Transport {
        #[source]
        cause: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// Stored ciphertext failed authentication-tag verification.
    #[error("stored credential failed integrity check (tampered, corrupted or wrong master key)")]
    Tamper,

    /// A response did not match the expected schema.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Credential database failure.
    #[error("credential storage error: {0}")]
    Storage(#[source] Arc<rusqlite::Error>),
}

impl Error {
    pub(crate) fn transport<E>(cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport {
            cause: Arc::new(cause),
        }
    }

    /// True for outcomes that require the user to authorize again.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Error::NoCredential { .. }
                | Error::ReauthRequired { .. }
                | Error::AuthenticationFailed { .. }
                | Error::RefreshFailed { .. }
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(Arc::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_transport_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::transport(io);

        assert!(err.to_string().contains("refused"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_clone_preserves_variant() {
        let err = Error::RefreshFailed {
            status: 400,
            body: "invalid_grant".to_string(),
        };
        match err.clone() {
            Error::RefreshFailed { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid_grant");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_is_auth() {
        assert!(Error::NoCredential { provider: "whoop".into() }.is_auth());
        assert!(Error::ReauthRequired { provider: "whoop".into() }.is_auth());
        assert!(!Error::Tamper.is_auth());
        assert!(!Error::Upstream { status: 500, body: String::new() }.is_auth());
    }
}
