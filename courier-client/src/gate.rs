//! Authentication gate.
//!
//! Decides for each request whether it may dispatch now, must wait for a
//! credential refresh that is already running, or must start that refresh.
//!
//! The shared credential, the refresh flag and the pending queue live under one
//! mutex. [`AuthGate::check`] inspects and updates them in a single critical
//! section, so at most one refresh can be started per gate, and an entry is
//! either queued before the refresh finishes or sees the refreshed state.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use courier_core::{AuthError, Authentication, Authenticator, Credential, CredentialKind};
use courier_store::{CredentialStore, StoreError};
use tracing::{debug, info, warn};

/// Outcome of [`AuthGate::check`].
pub(crate) enum AuthCheck<T> {
    /// The entry may dispatch now.
    Proceed(T),
    /// A refresh is in flight; the entry was queued and will be handed back
    /// by [`AuthGate::finish_refresh`].
    Queued,
    /// The credential has expired and this entry must drive the refresh.
    Refresh {
        /// The entry that triggered the refresh.
        entry: T,
        /// Authenticator to refresh with.
        authenticator: Arc<dyn Authenticator>,
        /// The expired credential.
        credential: Credential,
    },
}

impl<T> fmt::Debug for AuthCheck<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proceed(_) => f.write_str("Proceed"),
            Self::Queued => f.write_str("Queued"),
            Self::Refresh { .. } => f.write_str("Refresh"),
        }
    }
}

struct GateState<T> {
    authenticator: Option<Arc<dyn Authenticator>>,
    credential: Option<Credential>,
    re_authenticating: bool,
    pending: VecDeque<T>,
    /// Identifier the store was last read for, hit or miss.
    loaded_for: Option<String>,
}

// ============================================================================
// Auth Gate
// ============================================================================

/// Single-flight credential refresh guard with a queue of waiting entries.
pub(crate) struct AuthGate<T> {
    state: Mutex<GateState<T>>,
    store: CredentialStore,
    default_identifier: String,
}

impl<T> AuthGate<T> {
    /// Creates a gate persisting credentials through `store`.
    ///
    /// `default_identifier` is used when no authenticator supplies one.
    pub(crate) fn new(store: CredentialStore, default_identifier: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(GateState {
                authenticator: None,
                credential: None,
                re_authenticating: false,
                pending: VecDeque::new(),
                loaded_for: None,
            }),
            store,
            default_identifier: default_identifier.into(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads a credential from the store, treating failures as absence.
    fn load(&self, identifier: &str) -> Option<Credential> {
        match self.store.retrieve(identifier) {
            Ok(credential) => credential,
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "Failed to load stored credential");
                None
            }
        }
    }

    fn persist(&self, credential: Option<&Credential>, authenticator: Option<&dyn Authenticator>) -> Result<(), StoreError> {
        let (identifier, accessibility) = match authenticator {
            Some(authenticator) => (authenticator.auth_identifier(), authenticator.keychain_accessibility()),
            None => (self.default_identifier.as_str(), courier_core::Accessibility::default()),
        };
        self.store.store(credential, identifier, accessibility)
    }

    /// Loads the credential persisted under the default identifier, if any.
    pub(crate) fn load_default(&self) {
        if let Some(credential) = self.load(&self.default_identifier) {
            debug!(identifier = %self.default_identifier, "Loaded stored credential");
            self.lock().credential = Some(credential);
        }
    }

    /// Decides what to do with `entry`.
    pub(crate) fn check(&self, entry: T) -> AuthCheck<T> {
        let mut state = self.lock();

        let Some(authenticator) = state.authenticator.clone() else {
            return AuthCheck::Proceed(entry);
        };

        let has_token = state
            .credential
            .as_ref()
            .is_some_and(|c| c.kind() == CredentialKind::Token);
        let identifier = authenticator.auth_identifier();
        if !has_token && state.loaded_for.as_deref() != Some(identifier) {
            state.loaded_for = Some(identifier.to_string());
            if let Some(loaded) = self.load(identifier) {
                state.credential = Some(loaded);
            }
        }

        // Absent credentials are not gated; only expired ones are.
        let Some(credential) = state
            .credential
            .as_ref()
            .filter(|c| c.kind() == CredentialKind::Token)
        else {
            return AuthCheck::Proceed(entry);
        };

        if state.re_authenticating {
            state.pending.push_back(entry);
            debug!(pending = state.pending.len(), "Refresh in flight, queued request");
            return AuthCheck::Queued;
        }

        if !credential.has_expired() {
            return AuthCheck::Proceed(entry);
        }

        let credential = credential.clone();
        state.re_authenticating = true;
        info!(identifier = %authenticator.auth_identifier(), "Credential expired, starting refresh");

        AuthCheck::Refresh {
            entry,
            authenticator,
            credential,
        }
    }

    /// Records the result of a refresh and hands back every queued entry in
    /// arrival order.
    ///
    /// The new credential is installed, the flag cleared and the queue taken in
    /// one critical section.
    pub(crate) fn finish_refresh(
        &self,
        authenticator: &dyn Authenticator,
        outcome: &Result<Authentication, AuthError>,
    ) -> Vec<T> {
        let mut state = self.lock();

        match outcome {
            Ok(authentication) => {
                if authentication.persist {
                    if let Err(e) = self.persist(Some(&authentication.credential), Some(authenticator)) {
                        warn!(error = %e, "Failed to persist refreshed credential");
                    }
                }
                state.credential = Some(authentication.credential.clone());
                info!(identifier = %authenticator.auth_identifier(), "Credential refreshed");
            }
            Err(e) => {
                warn!(identifier = %authenticator.auth_identifier(), error = %e, "Credential refresh failed");
            }
        }

        state.re_authenticating = false;
        let drained: Vec<T> = state.pending.drain(..).collect();
        debug!(count = drained.len(), "Releasing queued requests");
        drained
    }

    /// Installs an authenticator and loads the credential stored under its identifier.
    pub(crate) fn set_authenticator(&self, authenticator: Option<Arc<dyn Authenticator>>) {
        let loaded = authenticator
            .as_ref()
            .and_then(|a| self.load(a.auth_identifier()));

        let mut state = self.lock();
        if loaded.is_some() {
            state.credential = loaded;
        }
        state.loaded_for = authenticator.as_ref().map(|a| a.auth_identifier().to_string());
        state.authenticator = authenticator;
    }

    /// The configured authenticator.
    pub(crate) fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        self.lock().authenticator.clone()
    }

    /// Replaces the shared credential, optionally persisting it.
    ///
    /// `None` clears the credential, and also deletes the stored copy when
    /// `persist` is set.
    pub(crate) fn set_credential(&self, credential: Option<Credential>, persist: bool) -> Result<(), StoreError> {
        let mut state = self.lock();
        if persist {
            self.persist(credential.as_ref(), state.authenticator.as_deref())?;
        }
        state.credential = credential;
        Ok(())
    }

    /// The current shared credential.
    pub(crate) fn credential(&self) -> Option<Credential> {
        self.lock().credential.clone()
    }

    /// Returns true while a refresh is in flight.
    pub(crate) fn is_re_authenticating(&self) -> bool {
        self.lock().re_authenticating
    }

    /// Number of entries waiting for the refresh.
    pub(crate) fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Removes queued entries matching `predicate`, keeping the others in order.
    pub(crate) fn remove_pending(&self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut state = self.lock();
        let (removed, kept): (VecDeque<T>, VecDeque<T>) =
            state.pending.drain(..).partition(|entry| predicate(entry));
        state.pending = kept;
        removed.into_iter().collect()
    }
}

impl<T> fmt::Debug for AuthGate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("AuthGate")
            .field("has_authenticator", &state.authenticator.is_some())
            .field("credential", &state.credential)
            .field("re_authenticating", &state.re_authenticating)
            .field("pending", &state.pending.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
