//! The HTTP engine seam.
//!
//! The controller only renders requests and interprets results; a [`Transport`]
//! does the actual I/O.
//!
//! - [`http`] - reqwest-backed transport with one client per session tier
//! - [`mock`] - recording transport for tests

pub mod http;
pub mod mock;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::TransportError;
use crate::request::{SessionTier, WireRequest};

pub use http::ReqwestTransport;
pub use mock::{MockResponse, MockTransport};

/// Identifier of one dispatched task, unique per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rendered request paired with the task it runs as.
#[derive(Debug, Clone)]
pub struct DispatchedRequest {
    /// Task identifier.
    pub task_id: TaskId,
    /// Session tier to run on.
    pub tier: SessionTier,
    /// The request itself.
    pub wire: WireRequest,
}

/// What the transport got back.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body bytes. Empty for downloads.
    pub body: Vec<u8>,
    /// Final URL, after redirects.
    pub url: Url,
}

// ============================================================================
// Progress
// ============================================================================

/// Transfer progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Fraction complete, between 0 and 1. Zero while the total is unknown.
    pub fraction: f64,
    /// Total size, when known.
    pub total_bytes: Option<u64>,
    /// Bytes moved so far.
    pub transferred_bytes: u64,
}

impl Progress {
    /// Computes progress from byte counts.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(transferred_bytes: u64, total_bytes: Option<u64>) -> Self {
        let fraction = total_bytes
            .filter(|total| *total > 0)
            .map_or(0.0, |total| (transferred_bytes as f64 / total as f64).min(1.0));
        Self {
            fraction,
            total_bytes,
            transferred_bytes,
        }
    }
}

/// Callback receiving transfer progress.
pub type ProgressHandler = Arc<dyn Fn(Progress) + Send + Sync>;

// ============================================================================
// Transport Trait
// ============================================================================

/// Performs rendered requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a one-shot request, buffering the body.
    async fn send(&self, request: DispatchedRequest) -> Result<TransportResponse, TransportError>;

    /// Uploads `payload` as the request body, reporting progress.
    async fn upload(
        &self,
        request: DispatchedRequest,
        payload: Vec<u8>,
        progress: ProgressHandler,
    ) -> Result<TransportResponse, TransportError>;

    /// Streams the response body into `destination`, reporting progress.
    async fn download(
        &self,
        request: DispatchedRequest,
        destination: &Path,
        progress: ProgressHandler,
    ) -> Result<TransportResponse, TransportError>;

    /// Drops all sessions and starts fresh ones.
    fn reset(&self) {}
}
