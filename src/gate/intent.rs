//! Durable single-slot hint for where the user should land after login.
//!
//! Storage is best-effort: every failure is logged at debug and swallowed, so a
//! disabled or broken backend degrades to "no intent stored" and callers fall
//! back to `/profile`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Key holding the intent in client storage.
pub const INTENT_STORAGE_KEY: &str = "app:lastAuthIntent";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable string key/value storage, the shape of a browser's local storage.
pub trait Storage: Send + Sync {
    /// # Errors
    /// Returns an error if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Unavailable)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Unavailable)?;
        items.remove(key);
        Ok(())
    }
}

/// JSON object on disk; survives process restarts.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Unavailable)?;
        // A corrupt file is replaced rather than blocking every later write.
        let mut items = match self.read() {
            Err(StorageError::Json(err)) => {
                debug!(path = %self.path.display(), error = %err, "discarding corrupt storage file");
                BTreeMap::new()
            }
            other => other?,
        };
        apply(&mut items);
        self.write(&items)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(self.read()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.remove(key);
        })
    }
}

/// Persistence turned off (private browsing, blocked storage).
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledStorage;

impl Storage for DisabledStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}

/// Where the user should end up after the next auth redirect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Verify,
    Profile,
}

impl Intent {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Verify => "/verify-email",
            Self::Profile => "/profile",
        }
    }

    /// Accepts both the bare name and the route path.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "verify" | "/verify-email" => Some(Self::Verify),
            "profile" | "/profile" => Some(Self::Profile),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct IntentStore {
    storage: Arc<dyn Storage>,
}

impl IntentStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Overwrite the stored hint.
    pub fn set_intent(&self, intent: Intent) {
        if let Err(err) = self.storage.set_item(INTENT_STORAGE_KEY, intent.path()) {
            debug!(error = %err, ?intent, "failed to persist intent");
        }
    }

    /// Current hint; unreadable or unknown values read as absent.
    #[must_use]
    pub fn get_intent(&self) -> Option<Intent> {
        match self.storage.get_item(INTENT_STORAGE_KEY) {
            Ok(value) => value.as_deref().and_then(Intent::parse),
            Err(err) => {
                debug!(error = %err, "failed to read intent");
                None
            }
        }
    }

    pub fn clear_intent(&self) {
        if let Err(err) = self.storage.remove_item(INTENT_STORAGE_KEY) {
            debug!(error = %err, "failed to clear intent");
        }
    }

    /// Stored hint, or `Profile` when nothing usable is stored.
    #[must_use]
    pub fn intent_or_default(&self) -> Intent {
        self.get_intent().unwrap_or(Intent::Profile)
    }
}

impl std::fmt::Debug for IntentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clear_then_get_is_absent() {
        let store = IntentStore::in_memory();
        store.set_intent(Intent::Verify);
        store.clear_intent();
        assert_eq!(store.get_intent(), None);
        // idempotent
        store.clear_intent();
        assert_eq!(store.get_intent(), None);
    }

    #[test]
    fn set_overwrites_single_slot() {
        let store = IntentStore::in_memory();
        store.set_intent(Intent::Verify);
        store.set_intent(Intent::Profile);
        assert_eq!(store.get_intent(), Some(Intent::Profile));
    }

    #[test]
    fn absent_defaults_to_profile() {
        let store = IntentStore::in_memory();
        assert_eq!(store.intent_or_default(), Intent::Profile);
    }

    #[test]
    fn disabled_storage_never_fails_callers() {
        let store = IntentStore::new(Arc::new(DisabledStorage));
        store.set_intent(Intent::Verify);
        assert_eq!(store.get_intent(), None);
        store.clear_intent();
        assert_eq!(store.intent_or_default(), Intent::Profile);
    }

    #[test]
    fn unknown_stored_value_reads_as_absent() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(INTENT_STORAGE_KEY, "/admin").unwrap();
        let store = IntentStore::new(storage);
        assert_eq!(store.get_intent(), None);
    }

    #[test]
    fn stores_route_path_under_fixed_key() {
        let storage = Arc::new(MemoryStorage::new());
        let store = IntentStore::new(storage.clone());
        store.set_intent(Intent::Verify);
        assert_eq!(
            storage.get_item(INTENT_STORAGE_KEY).unwrap().as_deref(),
            Some("/verify-email")
        );
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        IntentStore::new(Arc::new(FileStorage::new(&path))).set_intent(Intent::Verify);

        let reopened = IntentStore::new(Arc::new(FileStorage::new(&path)));
        assert_eq!(reopened.get_intent(), Some(Intent::Verify));
        reopened.clear_intent();
        assert_eq!(
            IntentStore::new(Arc::new(FileStorage::new(&path))).get_intent(),
            None
        );
    }

    #[test]
    fn corrupt_file_degrades_silently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();

        let store = IntentStore::new(Arc::new(FileStorage::new(&path)));
        assert_eq!(store.get_intent(), None);
        assert_eq!(store.intent_or_default(), Intent::Profile);
    }

    #[test]
    fn set_intent_overwrites_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();

        let store = IntentStore::new(Arc::new(FileStorage::new(&path)));
        store.set_intent(Intent::Verify);
        assert_eq!(store.get_intent(), Some(Intent::Verify));
        store.set_intent(Intent::Verify);
        assert_eq!(
            IntentStore::new(Arc::new(FileStorage::new(&path))).get_intent(),
            Some(Intent::Verify)
        );
    }

    #[test]
    fn intent_parse_accepts_names_and_paths() {
        assert_eq!(Intent::parse("verify"), Some(Intent::Verify));
        assert_eq!(Intent::parse("/verify-email"), Some(Intent::Verify));
        assert_eq!(Intent::parse("/profile"), Some(Intent::Profile));
        assert_eq!(Intent::parse(""), None);
    }
}
