//! # Tiered Envelope
//!
//! Text encryption that picks the strongest key-handling strategy the host
//! platform offers, and keeps everything older platforms produced readable.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tiered_envelope::{Engine, InMemoryPreferences, Mode, SoftwareKeyStore};
//!
//! let engine = Engine::new(
//!     2, // oldest tier that must stay decryptable
//!     2, // tier of this platform
//!     Arc::new(SoftwareKeyStore::in_memory()),
//!     Arc::new(InMemoryPreferences::new()),
//! )
//! .unwrap();
//!
//! let envelope = engine.encrypt("secret").unwrap();
//! assert!(envelope.starts_with(Mode::AesKeystore.tag()));
//! assert_eq!(engine.decrypt(&envelope).unwrap(), "secret");
//! ```
//!
//! ## Tiers
//!
//! | tier | mode               | key material                                   |
//! |------|--------------------|------------------------------------------------|
//! | T2   | `AES_KEYSTORE`     | non-extractable AES key in the key store       |
//! | T1   | `RSA_KEYSTORE`     | fresh AES key per call, RSA-OAEP wrapped        |
//! | T0   | `PASSWORD_DERIVED` | PBKDF2 over a persisted password, fresh salt   |
//!
//! ## Security Properties
//!
//! - **Encrypt-then-MAC**: AES-256-CBC plus HMAC-SHA256; tampering is a `Crypto` error
//! - **Fresh IV per call**: and a fresh salt or wrapped key where the mode has one
//! - **No silent downgrade**: a failed strategy never falls back to a weaker one
//! - **Create once**: long-lived keys and passwords are never regenerated
//!
//! ## What's NOT Provided
//!
//! - Key rotation or revocation
//! - Streaming encryption
//! - Signatures

#![deny(unsafe_code)]

mod cipher;
mod config;
mod engine;
mod error;
mod kdf;
mod keystore;
mod software;
mod storage;
mod strategy;
mod tier;

pub mod wire;

pub use cipher::{CipherKey, SymmetricKey, IV_BYTES, KEY_BYTES, MAC_BYTES};
pub use config::{
    EngineConfig, DEFAULT_AES_KEY_ALIAS, DEFAULT_KEY_PAIR_VALIDITY_YEARS, DEFAULT_PASSWORD_KEY,
    DEFAULT_RSA_KEY_ALIAS,
};
pub use engine::Engine;
pub use error::{EncryptionError, Result};
pub use kdf::{PBKDF2_ITERATIONS, SALT_BYTES};
pub use keystore::{KeyHandle, KeyPairValidity, SecureKeyStore, StoredKey};
pub use software::{SoftwareKeyStore, DEFAULT_RSA_BITS};
pub use storage::{FilePreferences, InMemoryPreferences, PreferenceStore};
pub use strategy::{KeyStrategy, KeystoreAesStrategy, PasswordDerivedStrategy, RsaWrapStrategy};
pub use tier::{CapabilityProbe, Mode, StaticProbe, Tier, TierRange};
pub use wire::{inspect, Envelope, EnvelopeInfo};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
