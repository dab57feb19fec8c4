// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Courier Core
//!
//! Core types, models, and traits shared by every Courier crate.
//!
//! This crate has no I/O of its own. It defines:
//!
//! - Domain models (credentials, HTTP methods, status classes, storage policy)
//! - Error types
//! - The seams other crates plug into ([`RequestBody`], [`Authenticator`])
//!
//! ## Key Types
//!
//! ### Credentials
//! - [`Credential`] - Token and/or username/password secret with optional expiry
//! - [`CredentialKind`] - Which shape of secret a credential carries
//! - [`Accessibility`] - Storage tier requested when persisting a credential
//!
//! ### HTTP
//! - [`HttpMethod`] - The nine request methods
//! - [`StatusClass`] - Semantic classification of a status code
//!
//! ### Traits
//! - [`RequestBody`] - Encodes a payload into bytes plus a content type
//! - [`Authenticator`] - Supplies initial and refreshed credentials

pub mod error;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::{AuthError, BodyError, CoreError};

// Re-export all model types
pub use models::{
    Accessibility, Credential, CredentialKind, HttpMethod, StatusClass, reason_phrase,
};

// Re-export traits
pub use traits::{Authentication, Authenticator, RequestBody};
