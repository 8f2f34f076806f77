//! T1: a fresh AES key per call, wrapped under a long-lived stored key pair.

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::cipher::{self, SymmetricKey};
use crate::error::Result;
use crate::keystore::{KeyHandle, KeyPairValidity, SecureKeyStore};
use crate::tier::Mode;
use crate::wire::Envelope;

use super::{check_mode, KeyStrategy};

/// Envelope: `1` + [wrapped key, iv, ciphertext].
pub struct RsaWrapStrategy {
    store: Arc<dyn SecureKeyStore>,
    pair: KeyHandle,
}

impl RsaWrapStrategy {
    /// Look up the key pair under `alias`, generating it on first use with a
    /// certificate valid for `validity_years`.
    pub fn init(store: Arc<dyn SecureKeyStore>, alias: &str, validity_years: u32) -> Result<Self> {
        let pair = if store.has_key(alias)? {
            tracing::debug!(alias, "using existing wrapping key pair");
            KeyHandle::new(alias)
        } else {
            let validity = KeyPairValidity::years_from_now(validity_years)?;
            let handle = store.generate_key_pair(alias, validity)?;
            tracing::info!(alias, not_after = %validity.not_after, "created wrapping key pair");
            handle
        };
        Ok(Self { store, pair })
    }
}

impl KeyStrategy for RsaWrapStrategy {
    fn mode(&self) -> Mode {
        Mode::RsaKeystore
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope> {
        let key = SymmetricKey::generate()?;
        let wrapped = self.store.wrap(&self.pair, key.as_bytes())?;
        let (iv, ciphertext) = cipher::encrypt(&key, plaintext)?;
        Ok(Envelope::new(
            Mode::RsaKeystore,
            vec![wrapped, iv.to_vec(), ciphertext],
        ))
    }

    fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        check_mode(Mode::RsaKeystore, envelope)?;
        let raw: Zeroizing<Vec<u8>> = self.store.unwrap(&self.pair, envelope.field(0)?)?;
        let key = SymmetricKey::from_bytes(&raw)?;
        cipher::decrypt(&key, envelope.field(1)?, envelope.field(2)?)
    }
}
