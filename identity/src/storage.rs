//! Durable key-value storage for session tokens and local preferences.
//!
//! DESIGN
//! ======
//! The browser keeps these keys in `localStorage`; native builds keep them in
//! a single JSON file. Both sit behind [`KeyValueStore`], whose writes are
//! whole-value replacements so a reader never observes a partial write.
//!
//! TRADE-OFFS
//! ==========
//! `FileStore` keeps no cache: every read goes to the file, and every
//! mutation re-reads it, applies the change and renames a temp file over it.
//! Several CLI processes can share one state file this way, each seeing the
//! others' writes. Two mutations racing in the same instant can still lose
//! one of them; the key set is tiny and writes are rare.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Fixed storage keys shared by every front end.
pub mod keys {
    pub const SESSION: &str = "portal.session";
    pub const REMEMBERED_EMAIL: &str = "portal.remembered_email";
    pub const LOCALE: &str = "portal.locale";
    pub const DEBUG_MODE: &str = "portal.debug_mode";
    pub const DEBUG_BACKEND_URL: &str = "portal.debug_backend_url";
}

pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// String key-value persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store. Used by tests and by SSR renders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// JSON-file backed store for native front ends.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        read_entries(&path)?;
        Ok(Self { path, write_lock: Mutex::new(()) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = read_entries(&self.path)?;
        apply(&mut entries);
        write_atomically(&self.path, &serde_json::to_vec_pretty(&entries)?)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match read_entries(&self.path) {
            Ok(mut entries) => entries.remove(key),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "failed to read state file");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

/// Per-process temp file next to `path`, so concurrent writers never share one.
fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", std::process::id()));
    PathBuf::from(tmp)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// =============================================================================
// PREFERENCES
// =============================================================================

/// Typed access to the non-session keys: remembered email and locale.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Email pre-filled on the sign-in form, if the user opted in.
    #[must_use]
    pub fn remembered_email(&self) -> Option<String> {
        self.store
            .get(keys::REMEMBERED_EMAIL)
            .filter(|v| !v.trim().is_empty())
    }

    /// Store the email when `remember` is set, otherwise forget it.
    pub fn set_remembered_email(&self, email: &str, remember: bool) -> Result<(), StorageError> {
        if remember {
            self.store.set(keys::REMEMBERED_EMAIL, email.trim())
        } else {
            self.store.remove(keys::REMEMBERED_EMAIL)
        }
    }

    #[must_use]
    pub fn locale(&self) -> String {
        self.store
            .get(keys::LOCALE)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_owned())
    }

    pub fn set_locale(&self, locale: &str) -> Result<(), StorageError> {
        self.store.set(keys::LOCALE, locale.trim())
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
