//! T0: keys derived from a password with PBKDF2 and a per-call salt.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use zeroize::Zeroizing;

use crate::cipher;
use crate::error::{EncryptionError, Result};
use crate::kdf;
use crate::storage::PreferenceStore;
use crate::tier::Mode;
use crate::wire::Envelope;

use super::{check_mode, KeyStrategy};

/// Raw length of a generated installation password, before base64.
pub const PASSWORD_BYTES: usize = 128;

/// Envelope: `2` + [salt, iv, ciphertext].
pub struct PasswordDerivedStrategy {
    password: Zeroizing<String>,
}

impl PasswordDerivedStrategy {
    /// Read the installation password from `prefs` under `key`, creating and
    /// persisting it if absent. An existing password is never replaced.
    pub fn init(prefs: &dyn PreferenceStore, key: &str) -> Result<Self> {
        let password = match prefs.get(key)? {
            Some(existing) if !existing.is_empty() => {
                tracing::debug!(key, "using stored password");
                Zeroizing::new(existing)
            }
            Some(_) => {
                return Err(EncryptionError::key_unavailable(format!(
                    "stored password under {} is empty",
                    key
                )))
            }
            None => {
                let password = generate_password()?;
                prefs.put(key, &password)?;
                tracing::info!(key, "created installation password");
                password
            }
        };
        Ok(Self { password })
    }

    /// Use a caller-supplied password. Nothing is read from or written to
    /// preference storage.
    pub fn with_password(password: &str) -> Result<Self> {
        if password.is_empty() {
            return Err(EncryptionError::key_unavailable("password cannot be empty"));
        }
        Ok(Self {
            password: Zeroizing::new(password.to_string()),
        })
    }
}

fn generate_password() -> Result<Zeroizing<String>> {
    let mut raw = Zeroizing::new([0u8; PASSWORD_BYTES]);
    getrandom::getrandom(raw.as_mut())
        .map_err(|e| EncryptionError::key_unavailable(format!("random password: {}", e)))?;
    Ok(Zeroizing::new(STANDARD.encode(raw.as_ref())))
}

impl KeyStrategy for PasswordDerivedStrategy {
    fn mode(&self) -> Mode {
        Mode::PasswordDerived
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope> {
        let salt = kdf::generate_salt()?;
        let key = kdf::derive_password_key(self.password.as_bytes(), &salt)?;
        let (iv, ciphertext) = cipher::encrypt(&key, plaintext)?;
        Ok(Envelope::new(
            Mode::PasswordDerived,
            vec![salt.to_vec(), iv.to_vec(), ciphertext],
        ))
    }

    fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        check_mode(Mode::PasswordDerived, envelope)?;
        let key = kdf::derive_password_key(self.password.as_bytes(), envelope.field(0)?)?;
        cipher::decrypt(&key, envelope.field(1)?, envelope.field(2)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryPreferences;

    #[test]
    fn password_created_once() {
        let prefs = InMemoryPreferences::new();
        let first = PasswordDerivedStrategy::init(&prefs, "pw").unwrap();
        let stored = prefs.get("pw").unwrap().unwrap();
        assert_eq!(STANDARD.decode(&stored).unwrap().len(), PASSWORD_BYTES);

        let env = first.encrypt(b"secret").unwrap();
        let second = PasswordDerivedStrategy::init(&prefs, "pw").unwrap();
        assert_eq!(prefs.get("pw").unwrap().unwrap(), stored);
        assert_eq!(second.decrypt(&env).unwrap(), b"secret");
    }

    #[test]
    fn fresh_salt_per_call() {
        let strategy = PasswordDerivedStrategy::with_password("pw").unwrap();
        let a = strategy.encrypt(b"x").unwrap();
        let b = strategy.encrypt(b"x").unwrap();
        assert_eq!(a.fields[0].len(), kdf::SALT_BYTES);
        assert_ne!(a.fields[0], b.fields[0]);
    }

    #[test]
    fn supplied_password_must_match() {
        let alice = PasswordDerivedStrategy::with_password("correct").unwrap();
        let mallory = PasswordDerivedStrategy::with_password("wrong").unwrap();
        let env = alice.encrypt(b"data").unwrap();
        assert_eq!(alice.decrypt(&env).unwrap(), b"data");
        assert!(mallory.decrypt(&env).unwrap_err().is_crypto());
    }

    #[test]
    fn empty_password_rejected() {
        let err = PasswordDerivedStrategy::with_password("").err().unwrap();
        assert!(err.is_key_unavailable());

        let prefs = InMemoryPreferences::new();
        prefs.put("pw", "").unwrap();
        let err = PasswordDerivedStrategy::init(&prefs, "pw").err().unwrap();
        assert!(err.is_key_unavailable());
    }
}
