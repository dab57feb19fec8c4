//! Client settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::request::Headers;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

// ============================================================================
// Client Settings
// ============================================================================

/// Settings for a request controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Block the scheduling thread until each request completes, including
    /// requests queued behind a credential refresh.
    ///
    /// For headless use only. Scheduling from inside the async runtime never blocks.
    #[serde(default)]
    pub synchronous: bool,

    /// Headers added to every request that does not set them itself.
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub default_headers: Headers,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            synchronous: false,
            default_headers: Headers::new(),
        }
    }
}

impl ClientSettings {
    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enables or disables synchronous mode.
    #[must_use]
    pub fn with_synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    /// Adds a default header.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), Some(value.into()));
        self
    }

    /// Default headers with the user agent merged in.
    pub(crate) fn effective_headers(&self) -> Headers {
        let mut headers = self.default_headers.clone();
        if crate::request::header_value(&headers, "User-Agent").is_none() {
            headers.insert("User-Agent".to_string(), Some(self.user_agent.clone()));
        }
        headers
    }
}
