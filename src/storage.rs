//! Preference storage: the local key/value store holding the persisted password.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{EncryptionError, Result};

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Local string key/value store, assumed encrypted at rest by the host.
///
/// Implement this for your platform:
/// - InMemoryPreferences (testing)
/// - FilePreferences (development, CLI)
/// - Platform shared preferences through FFI
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
}

fn poisoned() -> EncryptionError {
    EncryptionError::key_unavailable("preference lock poisoned")
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-memory preferences (for testing and ephemeral use).
pub struct InMemoryPreferences {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPreferences {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore for InMemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().map_err(|_| poisoned())?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// File-based preferences: one JSON object holding every entry.
///
/// The file is re-read on every `get` so several processes sharing a state
/// directory see each other's writes.
pub struct FilePreferences {
    path: PathBuf,
    write_lock: RwLock<()>,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| EncryptionError::key_unavailable(format!("create dir: {}", e)))?;
        }
        Ok(Self {
            path,
            write_lock: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let data = std::fs::read_to_string(&self.path)
            .map_err(|e| EncryptionError::key_unavailable(format!("read: {}", e)))?;
        serde_json::from_str(&data).map_err(|e| EncryptionError::key_unavailable(format!("parse: {}", e)))
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.write_lock.read().map_err(|_| poisoned())?;
        Ok(self.read_map()?.remove(key))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.write().map_err(|_| poisoned())?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        let json = serde_json::to_string_pretty(&map)
            .map_err(|e| EncryptionError::key_unavailable(format!("serialize: {}", e)))?;
        // Atomic write: write to temp, then rename
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| EncryptionError::key_unavailable(format!("write: {}", e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| EncryptionError::key_unavailable(format!("rename: {}", e)))?;
        Ok(())
    }
}
