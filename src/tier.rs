//! Capability tiers and the envelope modes they unlock.
//!
//! ```text
//! tier  0 (T0)   PasswordDerived   password in local storage + PBKDF2
//! tier  1 (T1)   RsaKeystore       fresh AES key wrapped under a stored RSA pair
//! tier >=2 (T2)  AesKeystore       non-extractable AES key inside the key store
//! ```
//!
//! A platform at tier N supports every mode whose threshold is <= N. Tier
//! comparisons happen here and nowhere else.

use std::fmt;

use crate::error::{EncryptionError, Result};

/// Ordered platform generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tier(u32);

impl Tier {
    /// Baseline: no secure key storage.
    pub const T0: Tier = Tier(0);
    /// Non-extractable asymmetric key pairs.
    pub const T1: Tier = Tier(1);
    /// Non-extractable symmetric keys.
    pub const T2: Tier = Tier(2);

    pub fn new(level: i32) -> Result<Self> {
        u32::try_from(level)
            .map(Tier)
            .map_err(|_| EncryptionError::config(format!("tier {} is below T0", level)))
    }

    pub fn level(self) -> u32 {
        self.0
    }

    /// Strongest mode a platform at this tier encrypts with.
    pub fn best_mode(self) -> Mode {
        if self >= Mode::AesKeystore.min_tier() {
            Mode::AesKeystore
        } else if self >= Mode::RsaKeystore.min_tier() {
            Mode::RsaKeystore
        } else {
            Mode::PasswordDerived
        }
    }
}

impl TryFrom<i32> for Tier {
    type Error = EncryptionError;

    fn try_from(level: i32) -> Result<Self> {
        Tier::new(level)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Envelope mode, ordered weakest to strongest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    PasswordDerived,
    RsaKeystore,
    AesKeystore,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::PasswordDerived, Mode::RsaKeystore, Mode::AesKeystore];

    /// Single-character envelope tag.
    pub fn tag(self) -> char {
        match self {
            Mode::AesKeystore => '0',
            Mode::RsaKeystore => '1',
            Mode::PasswordDerived => '2',
        }
    }

    pub fn from_tag(tag: char) -> Option<Mode> {
        match tag {
            '0' => Some(Mode::AesKeystore),
            '1' => Some(Mode::RsaKeystore),
            '2' => Some(Mode::PasswordDerived),
            _ => None,
        }
    }

    /// Number of `]`-separated fields after the tag.
    pub fn arity(self) -> usize {
        match self {
            // iv, ciphertext
            Mode::AesKeystore => 2,
            // wrapped key, iv, ciphertext
            Mode::RsaKeystore => 3,
            // salt, iv, ciphertext
            Mode::PasswordDerived => 3,
        }
    }

    pub fn min_tier(self) -> Tier {
        match self {
            Mode::PasswordDerived => Tier::T0,
            Mode::RsaKeystore => Tier::T1,
            Mode::AesKeystore => Tier::T2,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::AesKeystore => write!(f, "AES_KEYSTORE"),
            Mode::RsaKeystore => write!(f, "RSA_KEYSTORE"),
            Mode::PasswordDerived => write!(f, "PASSWORD_DERIVED"),
        }
    }
}

/// Tier range an engine serves: encrypt at `platform`, decrypt anything
/// produced by a tier in `min..=platform`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierRange {
    min: Tier,
    platform: Tier,
}

impl TierRange {
    pub fn new(min: Tier, platform: Tier) -> Result<Self> {
        if min > platform {
            return Err(EncryptionError::config(format!(
                "minimum tier {} is above platform tier {}",
                min, platform
            )));
        }
        Ok(Self { min, platform })
    }

    pub fn min(&self) -> Tier {
        self.min
    }

    pub fn platform(&self) -> Tier {
        self.platform
    }

    pub fn encryption_mode(&self) -> Mode {
        self.platform.best_mode()
    }

    /// Modes some tier in the range would have encrypted with, weakest first.
    pub fn required_modes(&self) -> Vec<Mode> {
        let floor = self.min.best_mode();
        let ceiling = self.platform.best_mode();
        Mode::ALL
            .into_iter()
            .filter(|m| *m >= floor && *m <= ceiling)
            .collect()
    }
}

/// Source of the current platform tier.
pub trait CapabilityProbe: Send + Sync {
    fn current_tier(&self) -> i32;
}

/// Probe that always reports the same tier.
#[derive(Clone, Copy, Debug)]
pub struct StaticProbe(pub i32);

impl CapabilityProbe for StaticProbe {
    fn current_tier(&self) -> i32 {
        self.0
    }
}
