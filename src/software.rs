//! Software key store: keeps keys in memory, optionally mirrored to disk.
//!
//! Stands in for a hardware key store on platforms (and in tests) that lack
//! one. Keys are "non-extractable" only by API: nothing on
//! [`SecureKeyStore`] hands out stored material, but the on-disk records are
//! plain hex.
//!
//! Directory layout:
//! ```text
//! keys/
//!   {hex(alias)}.json
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rand_core::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::cipher::{CipherKey, SymmetricKey, IV_BYTES};
use crate::error::{EncryptionError, Result};
use crate::keystore::{KeyHandle, KeyPairValidity, SecureKeyStore};

pub const DEFAULT_RSA_BITS: usize = 2048;

#[derive(Clone)]
enum Entry {
    Symmetric(SymmetricKey),
    KeyPair {
        private: Arc<RsaPrivateKey>,
        public: RsaPublicKey,
        validity: KeyPairValidity,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StoredEntry {
    Symmetric { key_hex: String },
    KeyPair { pkcs8_hex: String, validity: KeyPairValidity },
}

impl StoredEntry {
    fn from_entry(entry: &Entry) -> Result<Self> {
        match entry {
            Entry::Symmetric(key) => Ok(StoredEntry::Symmetric {
                key_hex: hex::encode(key.as_bytes()),
            }),
            Entry::KeyPair { private, validity, .. } => {
                let der = private
                    .to_pkcs8_der()
                    .map_err(|e| EncryptionError::key_unavailable(format!("encode key pair: {}", e)))?;
                Ok(StoredEntry::KeyPair {
                    pkcs8_hex: hex::encode(der.as_bytes()),
                    validity: *validity,
                })
            }
        }
    }

    fn into_entry(self) -> Result<Entry> {
        match self {
            StoredEntry::Symmetric { key_hex } => {
                let raw = Zeroizing::new(
                    hex::decode(key_hex)
                        .map_err(|e| EncryptionError::key_unavailable(format!("decode key: {}", e)))?,
                );
                Ok(Entry::Symmetric(SymmetricKey::from_bytes(&raw)?))
            }
            StoredEntry::KeyPair { pkcs8_hex, validity } => {
                let der = Zeroizing::new(
                    hex::decode(pkcs8_hex)
                        .map_err(|e| EncryptionError::key_unavailable(format!("decode key pair: {}", e)))?,
                );
                let private = RsaPrivateKey::from_pkcs8_der(&der)
                    .map_err(|e| EncryptionError::key_unavailable(format!("parse key pair: {}", e)))?;
                let public = RsaPublicKey::from(&private);
                Ok(Entry::KeyPair {
                    private: Arc::new(private),
                    public,
                    validity,
                })
            }
        }
    }
}

/// Software implementation of [`SecureKeyStore`].
pub struct SoftwareKeyStore {
    keys: RwLock<HashMap<String, Entry>>,
    dir: Option<PathBuf>,
    rsa_bits: usize,
}

impl SoftwareKeyStore {
    /// Keys live only as long as this value.
    pub fn in_memory() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            dir: None,
            rsa_bits: DEFAULT_RSA_BITS,
        }
    }

    /// Keys persist under `dir` across processes.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| EncryptionError::key_unavailable(format!("create dir: {}", e)))?;
        Ok(Self {
            keys: RwLock::new(HashMap::new()),
            dir: Some(dir),
            rsa_bits: DEFAULT_RSA_BITS,
        })
    }

    pub fn with_rsa_bits(mut self, bits: usize) -> Self {
        self.rsa_bits = bits;
        self
    }

    /// Certificate window of the key pair under `alias`, if one exists.
    pub fn key_pair_validity(&self, alias: &str) -> Result<Option<KeyPairValidity>> {
        Ok(match self.load(alias)? {
            Some(Entry::KeyPair { validity, .. }) => Some(validity),
            _ => None,
        })
    }

    fn key_path(dir: &Path, alias: &str) -> PathBuf {
        dir.join(format!("{}.json", hex::encode(alias)))
    }

    fn read_key_file(path: &Path) -> Result<Entry> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| EncryptionError::key_unavailable(format!("read: {}", e)))?;
        let stored: StoredEntry = serde_json::from_str(&data)
            .map_err(|e| EncryptionError::key_unavailable(format!("parse: {}", e)))?;
        stored.into_entry()
    }

    fn write_key_file(path: &Path, entry: &Entry) -> Result<()> {
        let json = serde_json::to_string_pretty(&StoredEntry::from_entry(entry)?)
            .map_err(|e| EncryptionError::key_unavailable(format!("serialize: {}", e)))?;
        // Atomic write: write to temp, then rename
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| EncryptionError::key_unavailable(format!("write: {}", e)))?;
        std::fs::rename(&tmp, path).map_err(|e| EncryptionError::key_unavailable(format!("rename: {}", e)))?;
        Ok(())
    }

    fn load(&self, alias: &str) -> Result<Option<Entry>> {
        {
            let keys = self.keys.read().map_err(|_| poisoned())?;
            if let Some(entry) = keys.get(alias) {
                return Ok(Some(entry.clone()));
            }
        }

        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        let path = Self::key_path(dir, alias);
        if !path.exists() {
            return Ok(None);
        }
        let entry = Self::read_key_file(&path)?;
        self.keys
            .write()
            .map_err(|_| poisoned())?
            .insert(alias.to_string(), entry.clone());
        Ok(Some(entry))
    }

    fn insert_new(&self, alias: &str, entry: Entry) -> Result<()> {
        if self.load(alias)?.is_some() {
            return Err(EncryptionError::key_unavailable(format!(
                "alias {} already holds a key",
                alias
            )));
        }
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        if keys.contains_key(alias) {
            return Err(EncryptionError::key_unavailable(format!(
                "alias {} already holds a key",
                alias
            )));
        }
        if let Some(dir) = &self.dir {
            Self::write_key_file(&Self::key_path(dir, alias), &entry)?;
        }
        keys.insert(alias.to_string(), entry);
        Ok(())
    }

    fn symmetric(&self, handle: &KeyHandle) -> Result<SymmetricKey> {
        match self.load(handle.alias())? {
            Some(Entry::Symmetric(key)) => Ok(key),
            Some(Entry::KeyPair { .. }) => Err(EncryptionError::key_unavailable(format!(
                "{} is a key pair, not a symmetric key",
                handle
            ))),
            None => Err(EncryptionError::key_unavailable(format!("no key under {}", handle))),
        }
    }

    fn key_pair(&self, handle: &KeyHandle) -> Result<(Arc<RsaPrivateKey>, RsaPublicKey)> {
        match self.load(handle.alias())? {
            Some(Entry::KeyPair { private, public, .. }) => Ok((private, public)),
            Some(Entry::Symmetric(_)) => Err(EncryptionError::key_unavailable(format!(
                "{} is a symmetric key, not a key pair",
                handle
            ))),
            None => Err(EncryptionError::key_unavailable(format!("no key pair under {}", handle))),
        }
    }
}

impl Default for SoftwareKeyStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn poisoned() -> EncryptionError {
    EncryptionError::key_unavailable("key store lock poisoned")
}

impl SecureKeyStore for SoftwareKeyStore {
    fn has_key(&self, alias: &str) -> Result<bool> {
        Ok(self.load(alias)?.is_some())
    }

    fn generate_symmetric_key(&self, alias: &str) -> Result<KeyHandle> {
        let key = SymmetricKey::generate()?;
        self.insert_new(alias, Entry::Symmetric(key))?;
        tracing::info!(alias, "generated symmetric key");
        Ok(KeyHandle::new(alias))
    }

    fn generate_key_pair(&self, alias: &str, validity: KeyPairValidity) -> Result<KeyHandle> {
        let private = RsaPrivateKey::new(&mut OsRng, self.rsa_bits)
            .map_err(|e| EncryptionError::key_unavailable(format!("rsa keygen: {}", e)))?;
        let public = RsaPublicKey::from(&private);
        self.insert_new(
            alias,
            Entry::KeyPair {
                private: Arc::new(private),
                public,
                validity,
            },
        )?;
        tracing::info!(
            alias,
            bits = self.rsa_bits,
            not_after = %validity.not_after,
            "generated key pair"
        );
        Ok(KeyHandle::new(alias))
    }

    fn wrap(&self, handle: &KeyHandle, raw_key: &[u8]) -> Result<Vec<u8>> {
        let (_, public) = self.key_pair(handle)?;
        public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), raw_key)
            .map_err(|e| EncryptionError::crypto(format!("wrap: {}", e)))
    }

    fn unwrap(&self, handle: &KeyHandle, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let (private, _) = self.key_pair(handle)?;
        private
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map(Zeroizing::new)
            .map_err(|e| EncryptionError::crypto(format!("unwrap: {}", e)))
    }

    fn encrypt_with(&self, handle: &KeyHandle, iv: &[u8; IV_BYTES], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.symmetric(handle)?.seal(iv, plaintext)
    }

    fn decrypt_with(&self, handle: &KeyHandle, iv: &[u8; IV_BYTES], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.symmetric(handle)?.open(iv, ciphertext)
    }
}
