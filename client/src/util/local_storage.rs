//! `localStorage` as a [`KeyValueStore`].
//!
//! SYSTEM CONTEXT
//! ==============
//! Session tokens, the remembered email, the locale, and the debug override
//! all persist through this store in the browser. The storage handle is looked
//! up on every call rather than held, which keeps the type `Send + Sync` as
//! the trait requires.
//!
//! TRADE-OFFS
//! ==========
//! Server renders have no storage: reads miss and writes report
//! `Unavailable`, which callers already treat as best-effort.

use identity::storage::{KeyValueStore, StorageError};

#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

impl KeyValueStore for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        #[cfg(feature = "hydrate")]
        {
            storage()?.get_item(key).ok().flatten()
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = key;
            None
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        #[cfg(feature = "hydrate")]
        {
            storage()
                .ok_or_else(unavailable)?
                .set_item(key, value)
                .map_err(|e| StorageError::Unavailable(format!("{e:?}")))
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = (key, value);
            Err(unavailable())
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        #[cfg(feature = "hydrate")]
        {
            storage()
                .ok_or_else(unavailable)?
                .remove_item(key)
                .map_err(|e| StorageError::Unavailable(format!("{e:?}")))
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = key;
            Err(unavailable())
        }
    }
}

#[cfg(feature = "hydrate")]
fn storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

fn unavailable() -> StorageError {
    StorageError::Unavailable("localStorage is not available".to_owned())
}
