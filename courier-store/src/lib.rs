// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Courier Store
//!
//! Credential persistence for Courier.
//!
//! This crate provides:
//!
//! - **DataStore**: the raw contract for a secret store holding opaque bytes
//! - **KeychainStore**: the system keychain backend (via `keyring`)
//! - **MemoryStore**: an in-process backend for tests and keychain-less hosts
//! - **CredentialStore**: credential-level `store` / `retrieve` / `delete`
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use courier_store::{CredentialStore, MemoryStore};
//!
//! let store = CredentialStore::new(Arc::new(MemoryStore::new()));
//! store.store(Some(&credential), "api", Accessibility::Always)?;
//! assert!(store.retrieve("api")?.is_some());
//! ```

pub mod credential_store;
pub mod data_store;
pub mod error;
pub mod keychain;

pub use credential_store::CredentialStore;
pub use data_store::{DataStore, MemoryStore};
pub use error::StoreError;
pub use keychain::{KeychainStore, SERVICE_NAME};
