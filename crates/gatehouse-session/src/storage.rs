//! String key-value storage capability.
//!
//! Gatehouse does not own a storage engine. It asks for something that
//! can get, set and remove strings by key, and the embedding application
//! decides what backs it (cookies, a file, a browser store, memory).
//!
//! There are two areas:
//!
//! - **Durable**: survives restarts and is shared by every tab of the
//!   same origin. Session entries and the remembered credential live here.
//! - **Session**: scoped to one tab, gone when the tab is.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A string key-value store.
///
/// Implementations must not validate or transform values. Failures of
/// the backing medium (quota, availability) are the implementation's
/// concern; the trait surfaces none.
pub trait Storage: Send + Sync + 'static {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);

    /// Removes `key`. Removing a missing key is a no-op.
    fn remove(&self, key: &str);
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// An in-process [`Storage`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

// ---------------------------------------------------------------------------
// KeyStore
// ---------------------------------------------------------------------------

/// Which storage area an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageArea {
    /// Survives restarts, shared across tabs.
    Durable,
    /// Scoped to the current tab.
    Session,
}

/// The pair of storage areas handed to every Gatehouse component.
///
/// Cloning a `KeyStore` shares both areas. Use [`KeyStore::new_tab`] to
/// get a store that shares the durable area but has its own session
/// area, which is exactly what a second browser tab sees.
#[derive(Clone)]
pub struct KeyStore {
    durable: Arc<dyn Storage>,
    session: Arc<dyn Storage>,
}

impl KeyStore {
    /// Builds a key store over the given areas.
    pub fn new(durable: Arc<dyn Storage>, session: Arc<dyn Storage>) -> Self {
        Self { durable, session }
    }

    /// Builds a key store where both areas are fresh [`MemoryStorage`]s.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    /// Returns a store sharing this one's durable area with a fresh,
    /// empty session area.
    pub fn new_tab(&self) -> Self {
        Self {
            durable: Arc::clone(&self.durable),
            session: Arc::new(MemoryStorage::new()),
        }
    }

    fn area(&self, area: StorageArea) -> &dyn Storage {
        match area {
            StorageArea::Durable => self.durable.as_ref(),
            StorageArea::Session => self.session.as_ref(),
        }
    }

    /// Returns the value stored under `key` in `area`.
    pub fn get(&self, area: StorageArea, key: &str) -> Option<String> {
        self.area(area).get(key)
    }

    /// Stores `value` under `key` in `area`.
    pub fn set(&self, area: StorageArea, key: &str, value: &str) {
        self.area(area).set(key, value)
    }

    /// Removes `key` from `area`.
    pub fn remove(&self, area: StorageArea, key: &str) {
        self.area(area).remove(key)
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_set_get_remove() {
        let store = MemoryStorage::new();
        assert_eq!(store.get("k"), None);

        store.set("k", "v");
        assert_eq!(store.get("k").as_deref(), Some("v"));

        store.set("k", "v2");
        assert_eq!(store.get("k").as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);

        store.remove("k");
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_storage_remove_missing_is_noop() {
        let store = MemoryStorage::new();
        store.remove("never-set");
        assert!(store.is_empty());
    }

    #[test]
    fn test_key_store_areas_are_independent() {
        let keys = KeyStore::in_memory();
        keys.set(StorageArea::Durable, "k", "durable");
        keys.set(StorageArea::Session, "k", "session");

        assert_eq!(keys.get(StorageArea::Durable, "k").as_deref(), Some("durable"));
        assert_eq!(keys.get(StorageArea::Session, "k").as_deref(), Some("session"));

        keys.remove(StorageArea::Session, "k");
        assert_eq!(keys.get(StorageArea::Session, "k"), None);
        assert!(keys.get(StorageArea::Durable, "k").is_some());
    }

    #[test]
    fn test_new_tab_shares_durable_only() {
        let first = KeyStore::in_memory();
        let second = first.new_tab();

        first.set(StorageArea::Durable, "shared", "yes");
        first.set(StorageArea::Session, "private", "yes");

        assert_eq!(second.get(StorageArea::Durable, "shared").as_deref(), Some("yes"));
        assert_eq!(second.get(StorageArea::Session, "private"), None);
    }

    #[test]
    fn test_clone_shares_both_areas() {
        let first = KeyStore::in_memory();
        let copy = first.clone();
        copy.set(StorageArea::Session, "k", "v");
        assert_eq!(first.get(StorageArea::Session, "k").as_deref(), Some("v"));
    }
}
