//! Encrypted credential storage using SQLite.
//!
//! One row per provider. All secrets are sealed at rest with AES-256-GCM.

use super::{encryption, Credentials, MasterKey};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Encrypted credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE credentials (
///     provider TEXT PRIMARY KEY,
///     access_token BLOB NOT NULL,   -- nonce || ciphertext || tag
///     refresh_token BLOB,           -- nonce || ciphertext || tag (optional)
///     expires_at INTEGER,           -- unix seconds (NULL for static keys)
///     updated_at INTEGER NOT NULL   -- unix seconds
/// );
/// ```
///
/// # Thread Safety
/// The connection is wrapped in a Mutex; every call completes before
/// returning, so a `store` followed by a `load` always observes the write.
pub struct CredentialStore {
    conn: Mutex<Connection>,
    key: MasterKey,
}

impl CredentialStore {
    /// Creates or opens a credential store at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P, key: MasterKey) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn, key)
    }

    /// Creates a store that lives only as long as the process.
    pub fn in_memory(key: MasterKey) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, key)
    }

    fn with_connection(conn: Connection, key: MasterKey) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                provider TEXT PRIMARY KEY,
                access_token BLOB NOT NULL,
                refresh_token BLOB,
                expires_at INTEGER,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            key,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores credentials for a provider, replacing any previous row.
    ///
    /// Access and refresh tokens are sealed independently.
    pub fn store(
        &self,
        provider: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let access_sealed = encryption::seal(access_token, &self.key)?;
        let refresh_sealed = refresh_token
            .map(|token| encryption::seal(token, &self.key))
            .transpose()?;

        self.conn().execute(
            r#"
            INSERT INTO credentials (provider, access_token, refresh_token, expires_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
            params![
                provider,
                access_sealed,
                refresh_sealed,
                expires_at.map(|dt| dt.timestamp()),
                Utc::now().timestamp(),
            ],
        )?;

        debug!(
            provider = %provider,
            has_refresh_token = refresh_token.is_some(),
            "Stored credentials"
        );
        Ok(())
    }

    /// Stores the full credential set returned by a token exchange.
    pub fn store_credentials(&self, provider: &str, credentials: &Credentials) -> Result<()> {
        self.store(
            provider,
            &credentials.access_token,
            credentials.refresh_token.as_deref(),
            credentials.expires_at,
        )
    }

    /// Stores a static API key: no refresh token, no expiry.
    pub fn store_api_key(&self, provider: &str, api_key: &str) -> Result<()> {
        self.store(provider, api_key, None, None)
    }

    /// Loads and decrypts credentials for a provider.
    ///
    /// Returns `Ok(None)` when nothing is stored and [`Error::Tamper`] when a
    /// sealed field does not verify.
    pub fn load(&self, provider: &str) -> Result<Option<Credentials>> {
        let row = self
            .conn()
            .query_row(
                r#"
                SELECT access_token, refresh_token, expires_at
                FROM credentials
                WHERE provider = ?1
                "#,
                params![provider],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, Option<Vec<u8>>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((access_sealed, refresh_sealed, expires_at)) = row else {
            return Ok(None);
        };

        let access_token = encryption::open(&access_sealed, &self.key)?;
        let refresh_token = refresh_sealed
            .map(|sealed| encryption::open(&sealed, &self.key))
            .transpose()?;
        let expires_at = expires_at
            .map(|secs| DateTime::from_timestamp(secs, 0).ok_or(Error::Tamper))
            .transpose()?;

        Ok(Some(Credentials {
            access_token,
            refresh_token,
            expires_at,
        }))
    }

    /// Deletes credentials for a provider. Returns false if none were stored.
    pub fn delete(&self, provider: &str) -> Result<bool> {
        let rows_affected = self
            .conn()
            .execute("DELETE FROM credentials WHERE provider = ?1", params![provider])?;
        Ok(rows_affected > 0)
    }

    /// Lists providers that have stored credentials.
    pub fn list_providers(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT provider FROM credentials ORDER BY provider")?;
        let providers = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(providers)
    }

    #[cfg(test)]
    pub(crate) fn raw_access_blob(&self, provider: &str) -> Result<Vec<u8>> {
        Ok(self.conn().query_row(
            "SELECT access_token FROM credentials WHERE provider = ?1",
            params![provider],
            |row| row.get(0),
        )?)
    }

    #[cfg(test)]
    pub(crate) fn overwrite_access_blob(&self, provider: &str, blob: &[u8]) -> Result<()> {
        self.conn().execute(
            "UPDATE credentials SET access_token = ?2 WHERE provider = ?1",
            params![provider, blob],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_store() -> CredentialStore {
        CredentialStore::in_memory(MasterKey::from_bytes([0u8; 32]))
            .expect("Failed to create test store")
    }

    #[test]
    fn test_store_and_load() {
        let store = create_test_store();
        let expires_at = Utc::now() + Duration::hours(1);

        store
            .store("whoop", "access-token-12345", Some("refresh-token-67890"), Some(expires_at))
            .unwrap();

        let loaded = store.load("whoop").unwrap().expect("Credentials not found");
        assert_eq!(loaded.access_token, "access-token-12345");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh-token-67890"));
        assert_eq!(loaded.expires_at.map(|dt| dt.timestamp()), Some(expires_at.timestamp()));
    }

    #[test]
    fn test_load_nonexistent() {
        let store = create_test_store();
        assert!(store.load("whoop").unwrap().is_none());
    }

    #[test]
    fn test_store_replaces_previous_row() {
        let store = create_test_store();

        store
            .store("whoop", "old-access", Some("old-refresh"), Some(Utc::now()))
            .unwrap();
        store
            .store("whoop", "new-access", None, Some(Utc::now() + Duration::hours(2)))
            .unwrap();

        let loaded = store.load("whoop").unwrap().unwrap();
        assert_eq!(loaded.access_token, "new-access");
        assert!(loaded.refresh_token.is_none());
        assert_eq!(store.list_providers().unwrap(), vec!["whoop".to_string()]);
    }

    #[test]
    fn test_static_api_key() {
        let store = create_test_store();
        store.store_api_key("limitless", "sk-live-abc").unwrap();

        let loaded = store.load("limitless").unwrap().unwrap();
        assert_eq!(loaded.access_token, "sk-live-abc");
        assert!(loaded.refresh_token.is_none());
        assert!(loaded.expires_at.is_none());
    }

    #[test]
    fn test_tokens_are_not_stored_in_plaintext() {
        let store = create_test_store();
        store.store_api_key("limitless", "sk-live-abc").unwrap();

        let blob = store.raw_access_blob("limitless").unwrap();
        assert!(!blob.windows(b"sk-live-abc".len()).any(|w| w == b"sk-live-abc"));
    }

    #[test]
    fn test_tampered_row_raises_tamper() {
        let store = create_test_store();
        store.store("whoop", "access", Some("refresh"), None).unwrap();

        let mut blob = store.raw_access_blob("whoop").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        store.overwrite_access_blob("whoop", &blob).unwrap();

        assert!(matches!(store.load("whoop"), Err(Error::Tamper)));
    }

    #[test]
    fn test_key_change_invalidates_stored_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.db");

        {
            let store = CredentialStore::open(&path, MasterKey::from_bytes([1u8; 32])).unwrap();
            store.store("whoop", "access", Some("refresh"), None).unwrap();
        }

        let rekeyed = CredentialStore::open(&path, MasterKey::from_bytes([2u8; 32])).unwrap();
        assert!(matches!(rekeyed.load("whoop"), Err(Error::Tamper)));

        let original = CredentialStore::open(&path, MasterKey::from_bytes([1u8; 32])).unwrap();
        assert_eq!(original.load("whoop").unwrap().unwrap().access_token, "access");
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        store.store_api_key("limitless", "key").unwrap();

        assert!(store.delete("limitless").unwrap());
        assert!(store.load("limitless").unwrap().is_none());
        assert!(!store.delete("limitless").unwrap());
    }

    #[test]
    fn test_list_providers() {
        let store = create_test_store();
        store.store_api_key("limitless", "key").unwrap();
        store.store("whoop", "access", Some("refresh"), None).unwrap();

        assert_eq!(
            store.list_providers().unwrap(),
            vec!["limitless".to_string(), "whoop".to_string()]
        );
    }
}
