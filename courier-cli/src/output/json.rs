//! JSON output formatting.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use courier_client::Response;
use courier_core::{Credential, CredentialKind};
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOutput {
    pub status: u16,
    pub reason: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirected_from: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: BodyOutput,
}

/// Response body, decoded as far as possible.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BodyOutput {
    Json(Value),
    Text(String),
    Binary { bytes: usize },
}

impl BodyOutput {
    fn from_response(response: &Response) -> Self {
        if let Some(value) = response.json_value() {
            Self::Json(value.clone())
        } else if let Some(text) = response.text() {
            Self::Text(text.to_string())
        } else {
            Self::Binary {
                bytes: response.data().len(),
            }
        }
    }
}

impl ResponseOutput {
    /// Collects everything printable from a response.
    pub fn from_response(response: &Response) -> Self {
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect();

        Self {
            status: response.status(),
            reason: response.reason(),
            url: response.url().to_string(),
            redirected_from: response.redirected_from().map(ToString::to_string),
            headers,
            body: BodyOutput::from_response(response),
        }
    }
}

/// JSON output for the stored credential. Secrets are never printed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialOutput {
    pub identifier: String,
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub refreshable: bool,
}

impl CredentialOutput {
    /// Describes `credential` stored under `identifier`.
    pub fn new(identifier: &str, credential: Option<&Credential>) -> Self {
        Self {
            identifier: identifier.to_string(),
            present: credential.is_some(),
            kind: credential.map(|c| kind_name(c.kind())),
            token_type: credential
                .filter(|c| c.kind() == CredentialKind::Token)
                .map(|c| c.token_type.clone()),
            username: credential.and_then(|c| c.username.clone()),
            expires_at: credential.and_then(|c| c.expiration_date),
            expired: credential.is_some_and(Credential::has_expired),
            refreshable: credential.is_some_and(|c| c.refresh_token.is_some()),
        }
    }
}

/// Human name of a credential kind.
pub fn kind_name(kind: CredentialKind) -> &'static str {
    match kind {
        CredentialKind::Token => "token",
        CredentialKind::Basic => "basic",
        CredentialKind::Empty => "empty",
    }
}

/// JSON output for a finished download.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutput {
    pub status: u16,
    pub url: String,
    pub location: String,
    pub bytes: u64,
}

impl DownloadOutput {
    /// Describes a download saved at `location`.
    pub fn new(response: &Response, location: &Path, bytes: u64) -> Self {
        Self {
            status: response.status(),
            url: response.url().to_string(),
            location: location.display().to_string(),
            bytes,
        }
    }
}

// ============================================================================
// Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Serializes any output value.
    pub fn format<T: Serialize>(&self, value: &T) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(value)?)
        } else {
            Ok(serde_json::to_string(value)?)
        }
    }
}
