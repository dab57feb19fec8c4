//! Credential persistence on top of a [`DataStore`].
//!
//! ## Usage
//!
//! ```ignore
//! use courier_store::CredentialStore;
//!
//! let store = CredentialStore::keychain();
//!
//! // Store a credential (inserts or updates in place)
//! store.store(Some(&credential), "my-api", Accessibility::AfterFirstUnlock)?;
//!
//! // Retrieve it
//! if let Some(credential) = store.retrieve("my-api")? {
//!     println!("Expired: {}", credential.has_expired());
//! }
//!
//! // Storing `None` deletes the entry
//! store.store(None, "my-api", Accessibility::AfterFirstUnlock)?;
//! ```

use std::sync::Arc;

use courier_core::{Accessibility, Credential};
use tracing::debug;

use crate::data_store::DataStore;
use crate::error::StoreError;
use crate::keychain::KeychainStore;

/// Reads and writes [`Credential`]s through a pluggable [`DataStore`].
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn DataStore>,
}

impl CredentialStore {
    /// Creates a credential store over the given backend.
    pub fn new(backend: Arc<dyn DataStore>) -> Self {
        Self { backend }
    }

    /// Creates a credential store over the system keychain.
    pub fn keychain() -> Self {
        Self::new(Arc::new(KeychainStore::default()))
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &Arc<dyn DataStore> {
        &self.backend
    }

    /// Stores a credential under `identifier`.
    ///
    /// An existing entry is updated in place, otherwise a new one is added.
    /// Passing `None` deletes the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend fails.
    pub fn store(
        &self,
        credential: Option<&Credential>,
        identifier: &str,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        let Some(credential) = credential else {
            self.delete(identifier)?;
            return Ok(());
        };

        let data = credential.to_bytes()?;

        if self.backend.retrieve(identifier)?.is_some() {
            self.backend.update(&data, identifier, accessibility)?;
        } else {
            self.backend.add(&data, identifier, accessibility)?;
        }

        debug!(identifier = %identifier, "Credential stored");
        Ok(())
    }

    /// Retrieves the credential stored under `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the stored bytes are not a credential,
    /// or the backend's error.
    pub fn retrieve(&self, identifier: &str) -> Result<Option<Credential>, StoreError> {
        self.backend
            .retrieve(identifier)?
            .map(|data| Credential::from_bytes(&data).map_err(StoreError::from))
            .transpose()
    }

    /// Deletes the credential stored under `identifier`, returning whether one existed.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub fn delete(&self, identifier: &str) -> Result<bool, StoreError> {
        let removed = self.backend.remove(identifier)?;
        debug!(identifier = %identifier, removed, "Credential deleted");
        Ok(removed)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::keychain()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
