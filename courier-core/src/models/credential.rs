//! Credential types.
//!
//! A [`Credential`] is the secret material used to authorize requests: a bearer-style
//! token, a username/password pair, or both. Token credentials may carry an expiry
//! and a refresh token.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default token type used in the `Authorization` header.
const DEFAULT_TOKEN_TYPE: &str = "Bearer";

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

// ============================================================================
// Credential
// ============================================================================

/// Secret material used to authorize requests.
///
/// A credential without an `expiration_date` never expires.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Token sent in the `Authorization` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_token: Option<String>,

    /// Username for basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Token type prefix, `Bearer` unless the issuer says otherwise.
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// When the token stops being valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,

    /// Token exchanged with the issuer to obtain a fresh credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    /// Creates a token credential that never expires.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            authorization_token: Some(token.into()),
            username: None,
            password: None,
            token_type: default_token_type(),
            expiration_date: None,
            refresh_token: None,
        }
    }

    /// Creates a username/password credential.
    pub fn with_basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            authorization_token: None,
            username: Some(username.into()),
            password: Some(password.into()),
            token_type: default_token_type(),
            expiration_date: None,
            refresh_token: None,
        }
    }

    /// Creates an OAuth2-style credential with a refresh token and an expiry.
    pub fn oauth2(
        token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            refresh_token,
            expiration_date: Some(expires_at),
            ..Self::with_token(token)
        }
    }

    /// Sets the token type.
    #[must_use]
    pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Sets the expiry.
    #[must_use]
    pub fn expires_at(mut self, date: DateTime<Utc>) -> Self {
        self.expiration_date = Some(date);
        self
    }

    /// Returns true if the credential has an expiry in the past.
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    /// Returns true if the credential was expired at `now`.
    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|expiry| now > expiry)
    }

    /// Returns which kind of secret this credential carries.
    ///
    /// Token material wins when both are present.
    pub fn kind(&self) -> CredentialKind {
        if self.authorization_token.is_some() {
            CredentialKind::Token
        } else if self.username.is_some() {
            CredentialKind::Basic
        } else {
            CredentialKind::Empty
        }
    }

    /// Derives the `Authorization` header value.
    pub fn authorization_header(&self) -> Option<String> {
        if let Some(token) = &self.authorization_token {
            return Some(format!("{} {}", self.token_type, token));
        }

        let username = self.username.as_deref()?;
        let password = self.password.as_deref().unwrap_or_default();
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        Some(format!("Basic {encoded}"))
    }

    /// Serializes the credential into opaque bytes for a secret store.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Restores a credential from bytes written by [`Credential::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCredential`] if the bytes are not a credential.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::InvalidCredential(e.to_string()))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(value: Option<&String>) -> Option<&'static str> {
            value.map(|_| "<redacted>")
        }

        f.debug_struct("Credential")
            .field("authorization_token", &redact(self.authorization_token.as_ref()))
            .field("username", &self.username)
            .field("password", &redact(self.password.as_ref()))
            .field("token_type", &self.token_type)
            .field("expiration_date", &self.expiration_date)
            .field("refresh_token", &redact(self.refresh_token.as_ref()))
            .finish()
    }
}

/// The shape of secret a [`Credential`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Token based (possibly also holding a username/password).
    Token,
    /// Username/password only.
    Basic,
    /// No secret material at all.
    Empty,
}

// ============================================================================
// Accessibility
// ============================================================================

/// Storage tier requested when a credential is persisted.
///
/// The value is passed through to the secret store untouched; how (and whether)
/// it is honored is up to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    /// Readable after the first unlock until restart. Migrates to new devices.
    #[default]
    AfterFirstUnlock,
    /// Always readable. Migrates to new devices.
    Always,
    /// Readable only while unlocked. Migrates to new devices.
    WhenUnlocked,
    /// Readable while unlocked, only when a passcode is set. Device bound.
    WhenPasscodeSetThisDeviceOnly,
    /// Readable only while unlocked. Device bound.
    WhenUnlockedThisDeviceOnly,
    /// Readable after the first unlock until restart. Device bound.
    AfterFirstUnlockThisDeviceOnly,
    /// Always readable. Device bound.
    AlwaysThisDeviceOnly,
}

impl Accessibility {
    /// Returns the stable identifier of this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AfterFirstUnlock => "after_first_unlock",
            Self::Always => "always",
            Self::WhenUnlocked => "when_unlocked",
            Self::WhenPasscodeSetThisDeviceOnly => "when_passcode_set_this_device_only",
            Self::WhenUnlockedThisDeviceOnly => "when_unlocked_this_device_only",
            Self::AfterFirstUnlockThisDeviceOnly => "after_first_unlock_this_device_only",
            Self::AlwaysThisDeviceOnly => "always_this_device_only",
        }
    }

    /// Returns true if items stored with this tier may move to a new device.
    pub fn migrates_to_new_devices(&self) -> bool {
        matches!(self, Self::AfterFirstUnlock | Self::Always | Self::WhenUnlocked)
    }

    /// Returns all tiers.
    pub fn all() -> &'static [Accessibility] {
        &[
            Self::AfterFirstUnlock,
            Self::Always,
            Self::WhenUnlocked,
            Self::WhenPasscodeSetThisDeviceOnly,
            Self::WhenUnlockedThisDeviceOnly,
            Self::AfterFirstUnlockThisDeviceOnly,
            Self::AlwaysThisDeviceOnly,
        ]
    }
}

impl std::fmt::Display for Accessibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
