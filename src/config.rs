//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EncryptionError, Result};
use crate::tier::{Tier, TierRange};

pub const DEFAULT_AES_KEY_ALIAS: &str = "tiered_envelope_aes";
pub const DEFAULT_RSA_KEY_ALIAS: &str = "tiered_envelope_rsa";
pub const DEFAULT_PASSWORD_KEY: &str = "tiered_envelope_password";
pub const DEFAULT_KEY_PAIR_VALIDITY_YEARS: u32 = 20;

/// Everything an [`Engine`](crate::Engine) needs besides its collaborators.
///
/// Missing fields in JSON fall back to [`EngineConfig::default`], which
/// targets a T2 platform with a T0 floor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Oldest tier whose envelopes must stay decryptable.
    pub min_tier: i32,
    /// Tier of the running platform.
    pub platform_tier: i32,
    pub aes_key_alias: String,
    pub rsa_key_alias: String,
    /// Preference key holding the installation password.
    pub password_key: String,
    pub key_pair_validity_years: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_tier: 0,
            platform_tier: 2,
            aes_key_alias: DEFAULT_AES_KEY_ALIAS.to_string(),
            rsa_key_alias: DEFAULT_RSA_KEY_ALIAS.to_string(),
            password_key: DEFAULT_PASSWORD_KEY.to_string(),
            key_pair_validity_years: DEFAULT_KEY_PAIR_VALIDITY_YEARS,
        }
    }
}

impl EngineConfig {
    pub fn new(min_tier: i32, platform_tier: i32) -> Self {
        Self {
            min_tier,
            platform_tier,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EncryptionError::config(format!("parse: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| EncryptionError::config(format!("read {}: {}", path.display(), e)))?;
        Self::from_json(&data)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EncryptionError::config(format!("serialize: {}", e)))
    }

    /// Tier range this configuration serves.
    pub fn tier_range(&self) -> Result<TierRange> {
        TierRange::new(Tier::new(self.min_tier)?, Tier::new(self.platform_tier)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.tier_range()?;
        for (name, value) in [
            ("aes_key_alias", &self.aes_key_alias),
            ("rsa_key_alias", &self.rsa_key_alias),
            ("password_key", &self.password_key),
        ] {
            if value.is_empty() {
                return Err(EncryptionError::config(format!("{} cannot be empty", name)));
            }
        }
        // Both live in the same key store; a shared alias makes the second
        // strategy find the first one's key.
        if self.aes_key_alias == self.rsa_key_alias {
            return Err(EncryptionError::config(format!(
                "aes_key_alias and rsa_key_alias are both {:?}",
                self.aes_key_alias
            )));
        }
        if self.key_pair_validity_years == 0 {
            return Err(EncryptionError::config("key_pair_validity_years must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "platform_tier": 1 }"#).unwrap();
        assert_eq!(config.platform_tier, 1);
        assert_eq!(config.min_tier, 0);
        assert_eq!(config.rsa_key_alias, DEFAULT_RSA_KEY_ALIAS);
    }

    #[test]
    fn invalid_configs_rejected() {
        assert!(EngineConfig::new(-1, 2).validate().unwrap_err().is_config());
        assert!(EngineConfig::new(2, 1).validate().unwrap_err().is_config());

        let mut config = EngineConfig::default();
        config.aes_key_alias.clear();
        assert!(config.validate().unwrap_err().is_config());

        let mut config = EngineConfig::default();
        config.key_pair_validity_years = 0;
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn shared_key_store_alias_rejected() {
        let mut config = EngineConfig::default();
        config.rsa_key_alias = config.aes_key_alias.clone();
        assert!(config.validate().unwrap_err().is_config());

        let json = r#"{ "aes_key_alias": "k", "rsa_key_alias": "k" }"#;
        assert!(EngineConfig::from_json(json).unwrap_err().is_config());

        // the password lives in preferences, not the key store
        let mut config = EngineConfig::default();
        config.password_key = config.aes_key_alias.clone();
        config.validate().unwrap();
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let config = EngineConfig::from_json(r#"{ "platform_tier": 0, "kdf_iterations": 20000 }"#).unwrap();
        assert_eq!(config, EngineConfig::new(0, 0));
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(EngineConfig::from_json("{ nope").unwrap_err().is_config());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let config = EngineConfig::new(1, 2);
        std::fs::write(&path, config.to_json().unwrap()).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
    }
}
