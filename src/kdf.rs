//! KDF
//!
//! password key = PBKDF2-HMAC-SHA256(password, salt, PBKDF2_ITERATIONS, len=32)
//! mac key      = HKDF-SHA256(key, salt=None, info=MAC_INFO, len=32)

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::cipher::{SymmetricKey, KEY_BYTES};
use crate::error::{EncryptionError, Result};

/// Domain separation for the MAC subkey.
pub const MAC_INFO: &[u8] = b"tiered-envelope|mac|v1";

pub const SALT_BYTES: usize = 32;
/// Part of the PASSWORD_DERIVED wire format: envelopes do not record the
/// count, so changing it orphans every existing password envelope.
pub const PBKDF2_ITERATIONS: u32 = 10_000;

pub fn derive_password_key(password: &[u8], salt: &[u8]) -> Result<SymmetricKey> {
    if password.is_empty() {
        return Err(EncryptionError::key_unavailable("password cannot be empty"));
    }

    let mut out = Zeroizing::new([0u8; KEY_BYTES]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ITERATIONS, out.as_mut());
    Ok(SymmetricKey::from_array(out))
}

pub fn mac_key(key: &[u8; KEY_BYTES]) -> Result<Zeroizing<[u8; 32]>> {
    let hk = Hkdf::<Sha256>::new(None, key);
    let mut out = Zeroizing::new([0u8; 32]);
    hk.expand(MAC_INFO, out.as_mut())
        .map_err(|_| EncryptionError::crypto("mac key expansion"))?;
    Ok(out)
}

pub fn generate_salt() -> Result<[u8; SALT_BYTES]> {
    let mut salt = [0u8; SALT_BYTES];
    getrandom::getrandom(&mut salt).map_err(|e| EncryptionError::crypto(format!("random salt: {}", e)))?;
    Ok(salt)
}
