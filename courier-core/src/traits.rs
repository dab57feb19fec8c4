//! Trait definitions for Courier.
//!
//! These are the seams the client plugs into: how request payloads become bytes,
//! and how credentials are obtained and refreshed.

use async_trait::async_trait;

use crate::error::{AuthError, BodyError};
use crate::models::{Accessibility, Credential};

/// A payload that can be sent as the body of a request.
///
/// Implementors only need to say what their content type is and how to turn
/// themselves into bytes.
pub trait RequestBody: Send + Sync + std::fmt::Debug {
    /// The intrinsic content type of the payload, if it has one.
    fn content_type(&self) -> Option<String>;

    /// Encodes the payload.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError`] if the value cannot be represented in its content type.
    fn payload(&self) -> Result<Vec<u8>, BodyError>;
}

/// The result of a successful (re-)authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    /// The credential to install as the shared credential.
    pub credential: Credential,
    /// Whether the credential should be written to the credential store.
    ///
    /// When false the credential lives in memory only.
    pub persist: bool,
}

impl Authentication {
    /// A credential that should be persisted.
    pub fn persisted(credential: Credential) -> Self {
        Self {
            credential,
            persist: true,
        }
    }

    /// A credential that should only be kept in memory.
    pub fn in_memory(credential: Credential) -> Self {
        Self {
            credential,
            persist: false,
        }
    }
}

/// Strategy that supplies and refreshes credentials for a request controller.
///
/// The controller calls [`re_authenticate`](Authenticator::re_authenticate) at most
/// once at a time, when the shared credential has expired. Requests that arrive while
/// the refresh runs are held back and replayed once it resolves.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Performs the initial authentication, when no credential exists yet.
    async fn authenticate(&self) -> Result<Authentication, AuthError>;

    /// Refreshes an expired credential.
    async fn re_authenticate(&self, credential: &Credential) -> Result<Authentication, AuthError>;

    /// The identifier the credential is stored under.
    fn auth_identifier(&self) -> &str;

    /// The storage tier used when persisting the credential.
    fn keychain_accessibility(&self) -> Accessibility {
        Accessibility::default()
    }
}
