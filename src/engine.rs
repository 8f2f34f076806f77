//! Strategy selector and public facade.
//!
//! The engine owns one lazily-built strategy per mode its tier range needs.
//! Encryption always goes to the platform's strongest mode; decryption is
//! routed by the envelope tag. There is no fallback between modes: a mode
//! that failed to initialize keeps failing with the same error.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::config::EngineConfig;
use crate::error::{EncryptionError, Result};
use crate::keystore::SecureKeyStore;
use crate::storage::PreferenceStore;
use crate::strategy::{KeyStrategy, KeystoreAesStrategy, PasswordDerivedStrategy, RsaWrapStrategy};
use crate::tier::{CapabilityProbe, Mode, TierRange};
use crate::wire;

/// Uninitialized (empty), Ready (`Ok`), or Failed (`Err`, cached).
type StrategySlot = OnceCell<Result<Arc<dyn KeyStrategy>>>;

struct Inner {
    config: EngineConfig,
    range: TierRange,
    keystore: Arc<dyn SecureKeyStore>,
    prefs: Arc<dyn PreferenceStore>,
    slots: BTreeMap<Mode, StrategySlot>,
}

/// Tiered encryption engine. Cheap to clone; clones share strategies.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(
        min_tier: i32,
        platform_tier: i32,
        keystore: Arc<dyn SecureKeyStore>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Result<Self> {
        Self::with_config(EngineConfig::new(min_tier, platform_tier), keystore, prefs)
    }

    /// Build an engine for the tier reported by `probe`.
    pub fn detect(
        min_tier: i32,
        probe: &dyn CapabilityProbe,
        keystore: Arc<dyn SecureKeyStore>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Result<Self> {
        let platform_tier = probe.current_tier();
        tracing::debug!(platform_tier, "probed platform tier");
        Self::new(min_tier, platform_tier, keystore, prefs)
    }

    pub fn with_config(
        config: EngineConfig,
        keystore: Arc<dyn SecureKeyStore>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Result<Self> {
        config.validate()?;
        let range = config.tier_range()?;
        let slots = range
            .required_modes()
            .into_iter()
            .map(|mode| (mode, StrategySlot::new()))
            .collect();

        tracing::debug!(
            min = %range.min(),
            platform = %range.platform(),
            encrypt = %range.encryption_mode(),
            "engine configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                range,
                keystore,
                prefs,
                slots,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Mode every `encrypt` call produces.
    pub fn encryption_mode(&self) -> Mode {
        self.inner.range.encryption_mode()
    }

    /// Modes this engine can decrypt, weakest first.
    pub fn supported_modes(&self) -> Vec<Mode> {
        self.inner.slots.keys().copied().collect()
    }

    /// Initialize every strategy now instead of on first use.
    pub fn initialize(&self) -> Result<()> {
        for mode in self.inner.slots.keys() {
            self.strategy(*mode)?;
        }
        Ok(())
    }

    pub fn encrypt(&self, text: &str) -> Result<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        let strategy = self.strategy(self.encryption_mode())?;
        wire::encode(&strategy.encrypt(text.as_bytes())?)
    }

    pub fn decrypt(&self, text: &str) -> Result<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        let envelope = wire::decode(text)?;
        let strategy = self.strategy(envelope.mode)?;
        into_text(strategy.decrypt(&envelope)?)
    }

    /// Encrypt under a caller-supplied password. Preference storage is not
    /// touched; the same password is needed to decrypt.
    pub fn encrypt_with_password(&self, text: &str, password: &str) -> Result<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        let strategy = PasswordDerivedStrategy::with_password(password)?;
        wire::encode(&strategy.encrypt(text.as_bytes())?)
    }

    pub fn decrypt_with_password(&self, text: &str, password: &str) -> Result<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        let envelope = wire::decode(text)?;
        if envelope.mode != Mode::PasswordDerived {
            return Err(EncryptionError::format(format!(
                "{} envelope cannot be opened with a password",
                envelope.mode
            )));
        }
        let strategy = PasswordDerivedStrategy::with_password(password)?;
        into_text(strategy.decrypt(&envelope)?)
    }

    /// [`Engine::encrypt`] on the blocking thread pool.
    pub async fn encrypt_async(&self, text: impl Into<String>) -> Result<String> {
        let engine = self.clone();
        let text = text.into();
        tokio::task::spawn_blocking(move || engine.encrypt(&text))
            .await
            .map_err(|e| EncryptionError::crypto(format!("encrypt task: {}", e)))?
    }

    /// [`Engine::decrypt`] on the blocking thread pool.
    pub async fn decrypt_async(&self, text: impl Into<String>) -> Result<String> {
        let engine = self.clone();
        let text = text.into();
        tokio::task::spawn_blocking(move || engine.decrypt(&text))
            .await
            .map_err(|e| EncryptionError::crypto(format!("decrypt task: {}", e)))?
    }

    fn strategy(&self, mode: Mode) -> Result<Arc<dyn KeyStrategy>> {
        let slot = self.inner.slots.get(&mode).ok_or_else(|| {
            EncryptionError::unsupported_tier(format!(
                "{} needs {} but this engine serves {}..={}",
                mode,
                mode.min_tier(),
                self.inner.range.min(),
                self.inner.range.platform()
            ))
        })?;
        slot.get_or_init(|| self.build(mode)).clone()
    }

    fn build(&self, mode: Mode) -> Result<Arc<dyn KeyStrategy>> {
        let inner = &self.inner;
        let config = &inner.config;
        tracing::debug!(%mode, "initializing strategy");

        let built: Result<Arc<dyn KeyStrategy>> = match mode {
            Mode::AesKeystore => KeystoreAesStrategy::init(inner.keystore.clone(), &config.aes_key_alias)
                .map(|s| Arc::new(s) as Arc<dyn KeyStrategy>),
            Mode::RsaKeystore => RsaWrapStrategy::init(
                inner.keystore.clone(),
                &config.rsa_key_alias,
                config.key_pair_validity_years,
            )
            .map(|s| Arc::new(s) as Arc<dyn KeyStrategy>),
            Mode::PasswordDerived => PasswordDerivedStrategy::init(inner.prefs.as_ref(), &config.password_key)
                .map(|s| Arc::new(s) as Arc<dyn KeyStrategy>),
        };

        if let Err(e) = &built {
            tracing::warn!(%mode, error = %e, "strategy initialization failed");
        }
        built
    }
}

fn into_text(plaintext: Vec<u8>) -> Result<String> {
    String::from_utf8(plaintext).map_err(|_| EncryptionError::crypto("decrypted bytes are not UTF-8"))
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("min_tier", &self.inner.range.min())
            .field("platform_tier", &self.inner.range.platform())
            .field("encryption_mode", &self.encryption_mode())
            .field("supported_modes", &self.supported_modes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareKeyStore;
    use crate::storage::InMemoryPreferences;
    use crate::tier::StaticProbe;

    fn engine(min: i32, platform: i32) -> Engine {
        Engine::with_config(
            EngineConfig::new(min, platform),
            Arc::new(SoftwareKeyStore::in_memory()),
            Arc::new(InMemoryPreferences::new()),
        )
        .unwrap()
    }

    #[test]
    fn selects_modes_from_tier_range() {
        let e = engine(0, 2);
        assert_eq!(e.encryption_mode(), Mode::AesKeystore);
        assert_eq!(e.supported_modes(), Mode::ALL.to_vec());

        let e = engine(1, 1);
        assert_eq!(e.encryption_mode(), Mode::RsaKeystore);
        assert_eq!(e.supported_modes(), vec![Mode::RsaKeystore]);

        let e = engine(0, 0);
        assert_eq!(e.encryption_mode(), Mode::PasswordDerived);
    }

    #[test]
    fn tiers_above_t2_behave_like_t2() {
        let e = engine(3, 7);
        assert_eq!(e.supported_modes(), vec![Mode::AesKeystore]);
    }

    #[test]
    fn bad_tiers_are_config_errors() {
        let ks: Arc<dyn SecureKeyStore> = Arc::new(SoftwareKeyStore::in_memory());
        let prefs: Arc<dyn PreferenceStore> = Arc::new(InMemoryPreferences::new());
        assert!(Engine::new(2, 1, ks.clone(), prefs.clone()).unwrap_err().is_config());
        assert!(Engine::new(-1, 1, ks, prefs).unwrap_err().is_config());
    }

    #[test]
    fn detect_uses_probe() {
        let e = Engine::detect(
            0,
            &StaticProbe(1),
            Arc::new(SoftwareKeyStore::in_memory()),
            Arc::new(InMemoryPreferences::new()),
        )
        .unwrap();
        assert_eq!(e.encryption_mode(), Mode::RsaKeystore);
    }

    #[test]
    fn empty_text_is_identity() {
        let e = engine(0, 2);
        assert_eq!(e.encrypt("").unwrap(), "");
        assert_eq!(e.decrypt("").unwrap(), "");
        assert_eq!(e.encrypt_with_password("", "pw").unwrap(), "");
        assert_eq!(e.decrypt_with_password("", "pw").unwrap(), "");
    }

    #[test]
    fn envelope_above_platform_is_unsupported() {
        let high = engine(2, 2);
        let low = engine(0, 1);
        let env = high.encrypt("abc").unwrap();
        assert!(low.decrypt(&env).unwrap_err().is_unsupported_tier());
    }

    #[test]
    fn password_variant_rejects_other_modes() {
        let e = engine(2, 2);
        let env = e.encrypt("abc").unwrap();
        assert!(e.decrypt_with_password(&env, "pw").unwrap_err().is_format());
    }

    #[test]
    fn debug_lists_modes() {
        let text = format!("{:?}", engine(1, 2));
        assert!(text.contains("RsaKeystore"));
        assert!(text.contains("AesKeystore"));
    }
}
