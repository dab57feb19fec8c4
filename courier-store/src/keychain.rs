//! Secure credential storage using the system keychain.
//!
//! This module provides access to the system's secure credential storage:
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)
//!
//! Every entry lives under one service name (the namespace) with the identifier
//! as the account.

use keyring::Entry;
use tracing::{debug, trace, warn};

use courier_core::Accessibility;

use crate::data_store::DataStore;
use crate::error::StoreError;

/// Service name used for Courier credentials.
pub const SERVICE_NAME: &str = "CourierCredential";

// ============================================================================
// Keychain Store
// ============================================================================

/// [`DataStore`] backed by the platform keychain through the `keyring` crate.
///
/// The platform decides how an [`Accessibility`] tier maps to its own policy;
/// backends without such a notion ignore it.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    /// Creates a store scoped to the given service namespace.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Returns the service namespace.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Creates a keyring entry.
    fn entry(&self, identifier: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, identifier).map_err(|e| StoreError::Platform(e.to_string()))
    }

    fn write(
        &self,
        data: &[u8],
        identifier: &str,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        trace!(identifier = %identifier, accessibility = %accessibility, "Writing keychain entry");

        self.entry(identifier)?.set_secret(data).map_err(|e| {
            warn!(service = %self.service, identifier = %identifier, error = %e, "Failed to write credential");
            StoreError::from(e)
        })
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl DataStore for KeychainStore {
    fn add(
        &self,
        data: &[u8],
        identifier: &str,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        debug!(service = %self.service, identifier = %identifier, "Adding credential to keychain");

        if self.retrieve(identifier)?.is_some() {
            return Err(StoreError::Duplicate(identifier.to_string()));
        }
        self.write(data, identifier, accessibility)
    }

    fn update(
        &self,
        data: &[u8],
        identifier: &str,
        accessibility: Accessibility,
    ) -> Result<(), StoreError> {
        debug!(service = %self.service, identifier = %identifier, "Updating credential in keychain");

        if self.retrieve(identifier)?.is_none() {
            return Err(StoreError::NotFound(identifier.to_string()));
        }
        self.write(data, identifier, accessibility)
    }

    fn retrieve(&self, identifier: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entry = self.entry(identifier)?;

        match entry.get_secret() {
            Ok(secret) => {
                debug!(service = %self.service, identifier = %identifier, "Credential found");
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(service = %self.service, identifier = %identifier, "Credential not found");
                Ok(None)
            }
            Err(e) => {
                warn!(service = %self.service, identifier = %identifier, error = %e, "Failed to get credential");
                Err(e.into())
            }
        }
    }

    fn remove(&self, identifier: &str) -> Result<bool, StoreError> {
        debug!(service = %self.service, identifier = %identifier, "Deleting credential from keychain");

        let entry = self.entry(identifier)?;

        match entry.delete_credential() {
            Ok(()) => {
                debug!(service = %self.service, identifier = %identifier, "Credential deleted");
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => {
                debug!(service = %self.service, identifier = %identifier, "Credential not found (already deleted)");
                Ok(false)
            }
            Err(e) => {
                warn!(service = %self.service, identifier = %identifier, error = %e, "Failed to delete credential");
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
