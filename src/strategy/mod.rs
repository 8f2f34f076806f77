//! Key strategies: one per envelope mode.
//!
//! Each strategy obtains symmetric key material from a different backing
//! capability and owns the mode-specific envelope fields. Strategies are
//! built lazily by the engine, at most once each.

mod keystore_aes;
mod password;
mod rsa_wrap;

pub use keystore_aes::KeystoreAesStrategy;
pub use password::PasswordDerivedStrategy;
pub use rsa_wrap::RsaWrapStrategy;

use crate::error::{EncryptionError, Result};
use crate::tier::Mode;
use crate::wire::Envelope;

/// Common contract of the three key strategies.
pub trait KeyStrategy: Send + Sync {
    fn mode(&self) -> Mode;

    /// Encrypt `plaintext` into an envelope tagged with [`KeyStrategy::mode`].
    fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope>;

    fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>>;
}

/// Reject an envelope routed to the wrong strategy before touching keys.
pub(crate) fn check_mode(expected: Mode, envelope: &Envelope) -> Result<()> {
    if envelope.mode != expected {
        return Err(EncryptionError::format(format!(
            "{} envelope given to the {} strategy",
            envelope.mode, expected
        )));
    }
    if envelope.fields.len() != expected.arity() {
        return Err(EncryptionError::format(format!(
            "{} needs {} fields, got {}",
            expected,
            expected.arity(),
            envelope.fields.len()
        )));
    }
    Ok(())
}
