//! Secure key store capability: where long-lived keys live.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::cipher::{CipherKey, IV_BYTES};
use crate::error::{EncryptionError, Result};

/// Opaque reference to a key inside a [`SecureKeyStore`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyHandle(String);

impl KeyHandle {
    pub fn new(alias: impl Into<String>) -> Self {
        Self(alias.into())
    }

    pub fn alias(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validity window of the self-signed certificate attached to a key pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairValidity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl KeyPairValidity {
    /// Starts now and lasts `years` years.
    pub fn years_from_now(years: u32) -> Result<Self> {
        let not_before = Utc::now();
        let not_after = not_before
            .checked_add_months(Months::new(years.saturating_mul(12)))
            .ok_or_else(|| EncryptionError::config(format!("{} year validity overflows", years)))?;
        if not_after <= not_before {
            return Err(EncryptionError::config("validity window is empty"));
        }
        Ok(Self { not_before, not_after })
    }

    pub fn duration(&self) -> Duration {
        self.not_after - self.not_before
    }
}

/// Platform key store holding non-extractable keys.
///
/// Implement this for your platform:
/// - SoftwareKeyStore (testing, development, platforms without hardware)
/// - Android Keystore / iOS Keychain through FFI
///
/// Symmetric keys are used only through `encrypt_with` / `decrypt_with`;
/// the raw material of a stored key never crosses this trait. Private keys
/// are used only through `unwrap`.
pub trait SecureKeyStore: Send + Sync {
    fn has_key(&self, alias: &str) -> Result<bool>;

    /// Create a 256-bit AES (CBC, PKCS#7) key under `alias`.
    fn generate_symmetric_key(&self, alias: &str) -> Result<KeyHandle>;

    /// Create an asymmetric key pair with a self-signed certificate.
    fn generate_key_pair(&self, alias: &str, validity: KeyPairValidity) -> Result<KeyHandle>;

    /// Encrypt `raw_key` under the public half of `handle`.
    fn wrap(&self, handle: &KeyHandle, raw_key: &[u8]) -> Result<Vec<u8>>;

    /// Recover a wrapped key with the private half of `handle`.
    fn unwrap(&self, handle: &KeyHandle, wrapped: &[u8]) -> Result<zeroize::Zeroizing<Vec<u8>>>;

    /// Authenticated CBC encryption under a stored symmetric key.
    fn encrypt_with(&self, handle: &KeyHandle, iv: &[u8; IV_BYTES], plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt_with(&self, handle: &KeyHandle, iv: &[u8; IV_BYTES], ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// A symmetric key that stays inside its key store.
pub struct StoredKey {
    store: Arc<dyn SecureKeyStore>,
    handle: KeyHandle,
}

impl StoredKey {
    pub fn new(store: Arc<dyn SecureKeyStore>, handle: KeyHandle) -> Self {
        Self { store, handle }
    }

    pub fn handle(&self) -> &KeyHandle {
        &self.handle
    }
}

impl CipherKey for StoredKey {
    fn seal(&self, iv: &[u8; IV_BYTES], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.store.encrypt_with(&self.handle, iv, plaintext)
    }

    fn open(&self, iv: &[u8; IV_BYTES], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.store.decrypt_with(&self.handle, iv, ciphertext)
    }
}
