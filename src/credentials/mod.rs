//! Encrypted credential storage for upstream providers.
//!
//! Access tokens, refresh tokens and static API keys are stored per provider
//! using AES-256-GCM encryption backed by SQLite.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore                    │
//! │  - one row per provider (upsert)         │
//! │  - transparent seal/open                 │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!     (seal)                (open, fails closed)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       Encryption Module                  │
//! │  - AES-256-GCM, 96-bit random nonces     │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       SQLite Database                    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use tether::credentials::{CredentialStore, MasterKey};
//! use chrono::{Duration, Utc};
//!
//! # fn main() -> tether::Result<()> {
//! let key = MasterKey::from_env()?;
//! let store = CredentialStore::open("credentials.db", key)?;
//!
//! store.store(
//!     "whoop",
//!     "access-token",
//!     Some("refresh-token"),
//!     Some(Utc::now() + Duration::hours(1)),
//! )?;
//!
//! if let Some(creds) = store.load("whoop")? {
//!     println!("expires at {:?}", creds.expires_at);
//! }
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};

mod encryption;
mod storage;

pub use encryption::{open, seal, MasterKey, MASTER_KEY_ENV};
pub use storage::CredentialStore;

/// Decrypted credentials for one provider.
///
/// `expires_at = None` marks a static API key that never expires and is
/// never refreshed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// OAuth access token, or the static API key
    pub access_token: String,

    /// OAuth refresh token (absent for static keys)
    pub refresh_token: Option<String>,

    /// Absolute expiry of the access token
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// True when the token expires within `margin` of `now`.
    ///
    /// Static keys never need a refresh.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => now + margin >= expires_at,
            None => false,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn expiring_in(seconds: i64, now: DateTime<Utc>) -> Credentials {
        Credentials {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at: Some(now + Duration::seconds(seconds)),
        }
    }

    #[test]
    fn test_needs_refresh_threshold() {
        let now = Utc::now();
        let margin = Duration::seconds(60);

        assert!(expiring_in(30, now).needs_refresh(now, margin));
        assert!(expiring_in(60, now).needs_refresh(now, margin));
        assert!(expiring_in(-10, now).needs_refresh(now, margin));
        assert!(!expiring_in(61, now).needs_refresh(now, margin));
        assert!(!expiring_in(3600, now).needs_refresh(now, margin));
    }

    #[test]
    fn test_static_key_never_refreshes() {
        let creds = Credentials {
            access_token: "key".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        assert!(!creds.needs_refresh(Utc::now(), Duration::seconds(60)));
    }

    #[test]
    fn test_debug_hides_tokens() {
        let rendered = format!("{:?}", expiring_in(10, Utc::now()));
        assert!(!rendered.contains("\"at\""));
        assert!(rendered.contains("<redacted>"));
    }
}
