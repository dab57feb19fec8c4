//! Store error types.

use thiserror::Error;

/// Errors that can occur while persisting credentials.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entry exists for the identifier.
    #[error("No entry for identifier: {0}")]
    NotFound(String),

    /// An entry already exists for the identifier.
    #[error("Entry already exists for identifier: {0}")]
    Duplicate(String),

    /// The platform refused access to the secret store.
    #[error("Access denied to secret store")]
    AccessDenied,

    /// The platform secret store failed.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Stored bytes could not be turned back into a credential.
    #[error("Invalid stored credential: {0}")]
    Corrupt(#[from] courier_core::CoreError),

    /// Generic error.
    #[error("Secret store error: {0}")]
    Other(String),
}

impl From<keyring::Error> for StoreError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoEntry => StoreError::NotFound(String::new()),
            keyring::Error::Ambiguous(_) => {
                StoreError::Other("Ambiguous credential entry".to_string())
            }
            keyring::Error::PlatformFailure(e) => StoreError::Platform(e.to_string()),
            keyring::Error::NoStorageAccess(_) => StoreError::AccessDenied,
            _ => StoreError::Other(err.to_string()),
        }
    }
}

impl StoreError {
    /// Returns true if the error means "nothing stored under this identifier".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
