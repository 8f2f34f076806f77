//! Unified error type for tiered envelopes.

use std::fmt;

/// Every failure surfaced by the engine, its strategies, and collaborators.
///
/// All variants are terminal for the call that produced them. Nothing is
/// retried and no partial plaintext is ever returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    /// Invalid tier or engine configuration. Surfaced at construction.
    Config(String),
    /// Malformed envelope: unknown tag, wrong field count, or bad base64.
    Format(String),
    /// Cipher, MAC, KDF, or key-wrap failure.
    Crypto(String),
    /// Key store or persisted password could not be read or created.
    KeyUnavailable(String),
    /// The envelope's mode needs a strategy this engine never built.
    UnsupportedTier(String),
}

impl EncryptionError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub(crate) fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub(crate) fn key_unavailable(msg: impl Into<String>) -> Self {
        Self::KeyUnavailable(msg.into())
    }

    pub(crate) fn unsupported_tier(msg: impl Into<String>) -> Self {
        Self::UnsupportedTier(msg.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    pub fn is_crypto(&self) -> bool {
        matches!(self, Self::Crypto(_))
    }

    pub fn is_key_unavailable(&self) -> bool {
        matches!(self, Self::KeyUnavailable(_))
    }

    pub fn is_unsupported_tier(&self) -> bool {
        matches!(self, Self::UnsupportedTier(_))
    }
}

impl fmt::Display for EncryptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid configuration: {}", msg),
            Self::Format(msg) => write!(f, "malformed envelope: {}", msg),
            Self::Crypto(msg) => write!(f, "cryptographic failure: {}", msg),
            Self::KeyUnavailable(msg) => write!(f, "key unavailable: {}", msg),
            Self::UnsupportedTier(msg) => write!(f, "unsupported tier: {}", msg),
        }
    }
}

impl std::error::Error for EncryptionError {}

pub type Result<T> = std::result::Result<T, EncryptionError>;
