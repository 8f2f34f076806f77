//! Symmetric cipher engine: AES-256-CBC / PKCS#7, encrypt-then-MAC.
//!
//! ciphertext field = cbc_ct || HMAC-SHA256(mac_key, iv || cbc_ct)
//!
//! Every call builds its own CBC context from the key and IV, so there is no
//! shared cipher state to serialize between threads.

use std::fmt;

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{EncryptionError, Result};
use crate::kdf;

pub const KEY_BYTES: usize = 32;
pub const BLOCK_BYTES: usize = 16;
pub const IV_BYTES: usize = BLOCK_BYTES;
pub const MAC_BYTES: usize = 32;

/// Shortest valid ciphertext field: one padded block plus the tag.
pub const MIN_CIPHERTEXT_BYTES: usize = BLOCK_BYTES + MAC_BYTES;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// A key the engine can encrypt under, wherever the key material lives.
///
/// Software keys implement this directly. Key-store-resident keys forward
/// to the store so the material never enters this process.
pub trait CipherKey: Send + Sync {
    fn seal(&self, iv: &[u8; IV_BYTES], plaintext: &[u8]) -> Result<Vec<u8>>;
    fn open(&self, iv: &[u8; IV_BYTES], ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// 256-bit AES key held in process memory. Zeroed on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: Zeroizing<[u8; KEY_BYTES]>,
}

impl SymmetricKey {
    /// Fresh random key.
    pub fn generate() -> Result<Self> {
        let mut bytes = Zeroizing::new([0u8; KEY_BYTES]);
        getrandom::getrandom(bytes.as_mut())
            .map_err(|e| EncryptionError::crypto(format!("random key: {}", e)))?;
        Ok(Self { bytes })
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() != KEY_BYTES {
            return Err(EncryptionError::crypto(format!(
                "expected {}-byte key, got {}",
                KEY_BYTES,
                raw.len()
            )));
        }
        let mut bytes = Zeroizing::new([0u8; KEY_BYTES]);
        bytes.copy_from_slice(raw);
        Ok(Self { bytes })
    }

    pub(crate) fn from_array(bytes: Zeroizing<[u8; KEY_BYTES]>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_BYTES] {
        &self.bytes
    }

    fn mac(&self, iv: &[u8], body: &[u8]) -> Result<HmacSha256> {
        let mac_key = kdf::mac_key(&self.bytes)?;
        let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key.as_ref())
            .map_err(|_| EncryptionError::crypto("mac key length"))?;
        mac.update(iv);
        mac.update(body);
        Ok(mac)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

impl CipherKey for SymmetricKey {
    fn seal(&self, iv: &[u8; IV_BYTES], plaintext: &[u8]) -> Result<Vec<u8>> {
        let enc = Aes256CbcEnc::new_from_slices(self.bytes.as_ref(), iv)
            .map_err(|_| EncryptionError::crypto("invalid key or iv length"))?;
        let mut out = enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let tag = self.mac(iv, &out)?.finalize().into_bytes();
        out.extend_from_slice(&tag);
        Ok(out)
    }

    fn open(&self, iv: &[u8; IV_BYTES], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < MIN_CIPHERTEXT_BYTES {
            return Err(EncryptionError::crypto("ciphertext truncated"));
        }
        let (body, tag) = ciphertext.split_at(ciphertext.len() - MAC_BYTES);
        if body.len() % BLOCK_BYTES != 0 {
            return Err(EncryptionError::crypto("ciphertext is not block aligned"));
        }

        // Authenticate before touching the padding.
        self.mac(iv, body)?
            .verify_slice(tag)
            .map_err(|_| EncryptionError::crypto("authentication failed"))?;

        let dec = Aes256CbcDec::new_from_slices(self.bytes.as_ref(), iv)
            .map_err(|_| EncryptionError::crypto("invalid key or iv length"))?;
        dec.decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_| EncryptionError::crypto("bad padding"))
    }
}

/// Random one-block IV. Never reused: every encryption draws a new one.
pub fn generate_iv() -> Result<[u8; IV_BYTES]> {
    let mut iv = [0u8; IV_BYTES];
    getrandom::getrandom(&mut iv).map_err(|e| EncryptionError::crypto(format!("random iv: {}", e)))?;
    Ok(iv)
}

pub fn encrypt(key: &dyn CipherKey, plaintext: &[u8]) -> Result<([u8; IV_BYTES], Vec<u8>)> {
    let iv = generate_iv()?;
    let ciphertext = key.seal(&iv, plaintext)?;
    Ok((iv, ciphertext))
}

pub fn decrypt(key: &dyn CipherKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let iv: &[u8; IV_BYTES] = iv
        .try_into()
        .map_err(|_| EncryptionError::crypto(format!("expected {}-byte iv, got {}", IV_BYTES, iv.len())))?;
    key.open(iv, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = SymmetricKey::generate().unwrap();
        let (iv, ct) = encrypt(&key, b"attack at dawn").unwrap();
        assert_eq!(decrypt(&key, &iv, &ct).unwrap(), b"attack at dawn");
    }

    #[test]
    fn empty_plaintext_pads_to_one_block() {
        let key = SymmetricKey::generate().unwrap();
        let (iv, ct) = encrypt(&key, b"").unwrap();
        assert_eq!(ct.len(), MIN_CIPHERTEXT_BYTES);
        assert!(decrypt(&key, &iv, &ct).unwrap().is_empty());
    }

    #[test]
    fn fresh_iv_per_call() {
        let key = SymmetricKey::generate().unwrap();
        let (iv1, ct1) = encrypt(&key, b"same").unwrap();
        let (iv2, ct2) = encrypt(&key, b"same").unwrap();
        assert_ne!(iv1, iv2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn wrong_key_fails() {
        let key = SymmetricKey::generate().unwrap();
        let other = SymmetricKey::generate().unwrap();
        let (iv, ct) = encrypt(&key, b"data").unwrap();
        assert!(decrypt(&other, &iv, &ct).unwrap_err().is_crypto());
    }

    #[test]
    fn tampered_body_fails() {
        let key = SymmetricKey::generate().unwrap();
        let (iv, mut ct) = encrypt(&key, b"data data data data").unwrap();
        ct[0] ^= 0x01;
        assert!(decrypt(&key, &iv, &ct).unwrap_err().is_crypto());
    }

    #[test]
    fn tampered_iv_fails() {
        let key = SymmetricKey::generate().unwrap();
        let (mut iv, ct) = encrypt(&key, b"data").unwrap();
        iv[3] ^= 0x80;
        assert!(decrypt(&key, &iv, &ct).unwrap_err().is_crypto());
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let key = SymmetricKey::generate().unwrap();
        let (iv, ct) = encrypt(&key, b"data").unwrap();
        assert!(decrypt(&key, &iv, &ct[..ct.len() - 1]).unwrap_err().is_crypto());
        assert!(decrypt(&key, &iv, &ct[..MAC_BYTES]).unwrap_err().is_crypto());
    }

    #[test]
    fn wrong_iv_length_fails() {
        let key = SymmetricKey::generate().unwrap();
        let (_, ct) = encrypt(&key, b"data").unwrap();
        assert!(decrypt(&key, &[0u8; 12], &ct).unwrap_err().is_crypto());
    }

    #[test]
    fn key_length_checked() {
        assert!(SymmetricKey::from_bytes(&[0u8; 16]).unwrap_err().is_crypto());
        assert!(SymmetricKey::from_bytes(&[0u8; 32]).is_ok());
    }

    #[test]
    fn debug_hides_material() {
        let key = SymmetricKey::from_bytes(&[7u8; 32]).unwrap();
        assert_eq!(format!("{:?}", key), "SymmetricKey(..)");
    }
}
