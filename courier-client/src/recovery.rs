//! Failures that offer recovery actions.
//!
//! Transport and status failures carry a handle back to the controller so the
//! caller can retry the identical request. Retrying goes through the full
//! scheduling path again, including the authentication check.

use std::fmt;
use std::sync::Weak;

use crate::error::RequestError;
use crate::job::Job;
use crate::response::Response;

/// Something that can put a job back through scheduling.
pub(crate) trait Rescheduler: Send + Sync {
    fn reschedule(&self, job: Job);
}

// ============================================================================
// Recovery Options
// ============================================================================

/// What a recovery option does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryKind {
    /// Schedule the same request again.
    Retry,
    /// Give up.
    Cancel,
}

/// An action offered to recover from a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOption {
    title: String,
    kind: RecoveryKind,
}

impl RecoveryOption {
    /// The retry option.
    pub fn retry() -> Self {
        Self {
            title: "Retry".to_string(),
            kind: RecoveryKind::Retry,
        }
    }

    /// The cancel option.
    pub fn cancel() -> Self {
        Self {
            title: "Cancel".to_string(),
            kind: RecoveryKind::Cancel,
        }
    }

    /// Display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// What the option does.
    pub fn kind(&self) -> RecoveryKind {
        self.kind
    }
}

// ============================================================================
// Request Failure
// ============================================================================

struct RetryHandle {
    scheduler: Weak<dyn Rescheduler>,
    job: Job,
}

/// The error side of a completion.
pub struct RequestFailure {
    error: RequestError,
    response: Option<Response>,
    retry: Option<RetryHandle>,
}

impl RequestFailure {
    /// A failure with no recovery options.
    pub(crate) fn new(error: RequestError, response: Option<Response>) -> Self {
        Self {
            error,
            response,
            retry: None,
        }
    }

    /// A failure offering Retry and Cancel.
    pub(crate) fn recoverable(
        error: RequestError,
        response: Option<Response>,
        scheduler: Weak<dyn Rescheduler>,
        job: Job,
    ) -> Self {
        Self {
            error,
            response,
            retry: Some(RetryHandle { scheduler, job }),
        }
    }

    /// The error.
    pub fn error(&self) -> &RequestError {
        &self.error
    }

    /// Consumes the failure, returning the error.
    pub fn into_error(self) -> RequestError {
        self.error
    }

    /// The response, when the server answered with an error status.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// The HTTP status code, when the server answered with an error status.
    pub fn status_code(&self) -> Option<u16> {
        self.error.status_code()
    }

    /// The actions offered to recover. Empty for construction, authentication
    /// and queue cancellation failures.
    pub fn recovery_options(&self) -> Vec<RecoveryOption> {
        if self.retry.is_some() {
            vec![RecoveryOption::retry(), RecoveryOption::cancel()]
        } else {
            Vec::new()
        }
    }

    /// Performs a recovery option.
    ///
    /// Returns false if the option is not offered, or the controller is gone.
    pub fn attempt_recovery(&self, option: &RecoveryOption) -> bool {
        let Some(retry) = &self.retry else {
            return false;
        };
        match option.kind() {
            RecoveryKind::Retry => match retry.scheduler.upgrade() {
                Some(scheduler) => {
                    scheduler.reschedule(retry.job.clone());
                    true
                }
                None => false,
            },
            RecoveryKind::Cancel => true,
        }
    }

    /// Shorthand for attempting [`RecoveryOption::retry`].
    pub fn retry(&self) -> bool {
        self.attempt_recovery(&RecoveryOption::retry())
    }
}

impl fmt::Debug for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFailure")
            .field("error", &self.error)
            .field("status", &self.response.as_ref().map(Response::status))
            .field("recoverable", &self.retry.is_some())
            .finish()
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for RequestFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<RequestError> for RequestFailure {
    fn from(error: RequestError) -> Self {
        Self::new(error, None)
    }
}
