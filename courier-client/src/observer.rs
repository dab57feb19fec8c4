//! Observer hooks for request lifecycle and network activity.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use crate::error::RequestError;
use crate::request::Request;
use crate::response::Response;

/// Receives every completed request.
///
/// Hooks run synchronously on the task that finished the request, before the
/// completion is queued. Keep them short.
pub trait RequestObserver: Send + Sync {
    /// Called for every request that produced a response.
    fn did_receive_response(&self, _request: &Request, _response: &Response) {}

    /// Called when a completed request is classified as an error.
    fn did_error(&self, _request: &Request, _error: &RequestError, _response: Option<&Response>) {}
}

/// Tracks whether the controller has work in flight.
///
/// Every scheduled request produces exactly one start and one end, whether it
/// completes, fails, or is cancelled.
pub trait ActivityObserver: Send + Sync {
    /// A request was scheduled.
    fn activity_started(&self);

    /// A request delivered its completion.
    fn activity_ended(&self);
}

/// [`ActivityObserver`] that counts requests in flight.
#[derive(Debug, Default)]
pub struct ActivityCounter {
    active: AtomicUsize,
}

impl ActivityCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests in flight.
    pub fn count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns true while any request is in flight.
    pub fn is_active(&self) -> bool {
        self.count() > 0
    }
}

impl ActivityObserver for ActivityCounter {
    fn activity_started(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn activity_ended(&self) {
        let ended = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if ended.is_err() {
            warn!("Activity ended with nothing in flight");
        }
    }
}
