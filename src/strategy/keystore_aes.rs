//! T2: a non-extractable AES key living inside the key store.

use std::sync::Arc;

use crate::cipher;
use crate::error::Result;
use crate::keystore::{KeyHandle, SecureKeyStore, StoredKey};
use crate::tier::Mode;
use crate::wire::Envelope;

use super::{check_mode, KeyStrategy};

/// Envelope: `0` + [iv, ciphertext].
pub struct KeystoreAesStrategy {
    key: StoredKey,
}

impl KeystoreAesStrategy {
    /// Look up the key under `alias`, generating it on first use.
    pub fn init(store: Arc<dyn SecureKeyStore>, alias: &str) -> Result<Self> {
        let handle = if store.has_key(alias)? {
            tracing::debug!(alias, "using existing keystore AES key");
            KeyHandle::new(alias)
        } else {
            let handle = store.generate_symmetric_key(alias)?;
            tracing::info!(alias, "created keystore AES key");
            handle
        };
        Ok(Self {
            key: StoredKey::new(store, handle),
        })
    }
}

impl KeyStrategy for KeystoreAesStrategy {
    fn mode(&self) -> Mode {
        Mode::AesKeystore
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope> {
        let (iv, ciphertext) = cipher::encrypt(&self.key, plaintext)?;
        Ok(Envelope::new(Mode::AesKeystore, vec![iv.to_vec(), ciphertext]))
    }

    fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        check_mode(Mode::AesKeystore, envelope)?;
        cipher::decrypt(&self.key, envelope.field(0)?, envelope.field(1)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareKeyStore;

    #[test]
    fn generates_once_then_reuses() {
        let store: Arc<dyn SecureKeyStore> = Arc::new(SoftwareKeyStore::in_memory());
        let first = KeystoreAesStrategy::init(store.clone(), "aes").unwrap();
        let env = first.encrypt(b"hello").unwrap();
        assert_eq!(env.fields.len(), 2);
        assert_eq!(env.fields[0].len(), cipher::IV_BYTES);

        let second = KeystoreAesStrategy::init(store, "aes").unwrap();
        assert_eq!(second.decrypt(&env).unwrap(), b"hello");
    }

    #[test]
    fn rejects_foreign_envelope() {
        let store: Arc<dyn SecureKeyStore> = Arc::new(SoftwareKeyStore::in_memory());
        let strategy = KeystoreAesStrategy::init(store, "aes").unwrap();
        let env = Envelope::new(Mode::PasswordDerived, vec![vec![], vec![], vec![]]);
        assert!(strategy.decrypt(&env).unwrap_err().is_format());
    }
}
