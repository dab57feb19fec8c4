//! The raw secret-store contract and an in-memory implementation.
//!
//! A [`DataStore`] holds opaque bytes under string identifiers within one fixed
//! service namespace. It knows nothing about credentials; see
//! [`CredentialStore`](crate::CredentialStore) for that layer.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use courier_core::Accessibility;
use tracing::trace;

use crate::error::StoreError;

// ============================================================================
// Data Store Trait
// ============================================================================

/// Backend that persists opaque secret bytes.
///
/// Identifiers are unique keys scoped to the store's service namespace.
pub trait DataStore: Send + Sync {
    /// Inserts a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if an entry already exists.
    fn add(
        &self,
        data: &[u8],
        identifier: &str,
        accessibility: Accessibility,
    ) -> Result<(), StoreError>;

    /// Replaces an existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is nothing to update.
    fn update(
        &self,
        data: &[u8],
        identifier: &str,
        accessibility: Accessibility,
    ) -> Result<(), StoreError>;

    /// Reads an entry.
    ///
    /// # Errors
    ///
    /// Returns an error only when the backend itself fails; a missing entry is `Ok(None)`.
    fn retrieve(&self, identifier: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Removes an entry, returning whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    fn remove(&self, identifier: &str) -> Result<bool, StoreError>;
}

// ============================================================================
// Memory Store
// ============================================================================

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Vec<u8>,
    accessibility: Accessibility,
}

/// A [`DataStore`] that keeps everything in process memory.
///
/// Useful for tests and for applications that must not touch the system keychain.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accessibility an entry was last written with.
    pub fn accessibility(&self, identifier: &str) -> Option<Accessibility> {
        self.lock().get(identifier).map(|entry| entry.accessibility)
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryEntry>> {
        // The map has no invariants a panicking writer could break.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DataStore for MemoryStore {
    fn add(
        &self,
        data: &[u8],
        identifier: &str,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        let mut entries = self.lock();
        if entries.contains_key(identifier) {
            return Err(StoreError::Duplicate(identifier.to_string()));
        }
        entries.insert(
            identifier.to_string(),
            MemoryEntry {
                data: data.to_vec(),
                accessibility,
            },
        );
        trace!(identifier = %identifier, "Added memory store entry");
        Ok(())
    }

    fn update(
        &self,
        data: &[u8],
        identifier: &str,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(identifier)
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;
        entry.data = data.to_vec();
        entry.accessibility = accessibility;
        trace!(identifier = %identifier, "Updated memory store entry");
        Ok(())
    }

    fn retrieve(&self, identifier: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().get(identifier).map(|entry| entry.data.clone()))
    }

    fn remove(&self, identifier: &str) -> Result<bool, StoreError> {
        Ok(self.lock().remove(identifier).is_some())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rejects_duplicates() {
        let store = MemoryStore::new();
        store.add(b"one", "id", Accessibility::Always).unwrap();

        let result = store.add(b"two", "id", Accessibility::Always);
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
        assert_eq!(store.retrieve("id").unwrap().unwrap(), b"one");
    }

    #[test]
    fn test_update_requires_existing_entry() {
        let store = MemoryStore::new();
        let result = store.update(b"data", "missing", Accessibility::Always);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_update_replaces_data_and_accessibility() {
        let store = MemoryStore::new();
        store.add(b"one", "id", Accessibility::Always).unwrap();
        store
            .update(b"two", "id", Accessibility::WhenUnlockedThisDeviceOnly)
            .unwrap();

        assert_eq!(store.retrieve("id").unwrap().unwrap(), b"two");
        assert_eq!(
            store.accessibility("id"),
            Some(Accessibility::WhenUnlockedThisDeviceOnly)
        );
    }

    #[test]
    fn test_remove_reports_existence() {
        let store = MemoryStore::new();
        store.add(b"one", "id", Accessibility::Always).unwrap();

        assert!(store.remove("id").unwrap());
        assert!(!store.remove("id").unwrap());
        assert!(store.is_empty());
    }
}
