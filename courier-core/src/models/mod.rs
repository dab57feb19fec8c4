//! Domain models for Courier.
//!
//! ## Submodules
//!
//! - [`credential`] - Credential material and its storage policy
//! - [`http`] - Request methods and response status classification

mod credential;
mod http;

// Re-export everything at the models level
pub use credential::{Accessibility, Credential, CredentialKind};
pub use http::{HttpMethod, StatusClass, reason_phrase};
