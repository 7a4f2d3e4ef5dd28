//! AES-256-GCM sealing for stored tokens.
//!
//! Each secret is sealed separately with its own random nonce. A sealed blob is
//! laid out as `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use crate::error::{Error, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt;

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes
const TAG_SIZE: usize = 16;

/// Environment variable holding the base64-encoded master key.
pub const MASTER_KEY_ENV: &str = "TETHER_ENCRYPTION_KEY";

/// Process-wide 256-bit master key.
///
/// Loaded once at startup. Changing it makes every previously stored
/// credential undecryptable.
#[derive(Clone)]
pub struct MasterKey([u8; KEY_SIZE]);

impl MasterKey {
    /// Decodes a base64 key that must be exactly 32 bytes once decoded.
    pub fn from_base64(key_base64: &str) -> Result<Self> {
        let key_bytes = BASE64
            .decode(key_base64.trim())
            .map_err(|e| Error::Configuration(format!("master key is not valid base64: {e}")))?;

        let bytes: [u8; KEY_SIZE] = key_bytes.as_slice().try_into().map_err(|_| {
            Error::Configuration(format!(
                "master key must be {} bytes (256 bits), got {} bytes",
                KEY_SIZE,
                key_bytes.len()
            ))
        })?;

        Ok(Self(bytes))
    }

    /// Reads the key from `TETHER_ENCRYPTION_KEY`.
    pub fn from_env() -> Result<Self> {
        let value = std::env::var(MASTER_KEY_ENV).map_err(|_| {
            Error::Configuration(format!(
                "{MASTER_KEY_ENV} is required (base64-encoded 32-byte key)"
            ))
        })?;
        Self::from_base64(&value)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Seals `plaintext` under `key` with a fresh random nonce.
pub fn seal(plaintext: &str, key: &MasterKey) -> Result<Vec<u8>> {
    // Never reuse a nonce under the same key
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = key
        .cipher()
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| Error::Configuration(format!("encryption failed: {e}")))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Opens a blob produced by [`seal`].
///
/// Fails closed: a short blob, a bad tag, a different key or non-UTF-8
/// plaintext all yield [`Error::Tamper`].
pub fn open(blob: &[u8], key: &MasterKey) -> Result<String> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Tamper);
    }

    let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Tamper)?;

    String::from_utf8(plaintext).map_err(|_| Error::Tamper)
}
