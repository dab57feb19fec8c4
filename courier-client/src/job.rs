//! Units of work moving through the scheduler.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::callback::CallbackQueue;
use crate::recovery::RequestFailure;
use crate::request::{Request, SessionTier};
use crate::response::{Download, Response};
use crate::transport::ProgressHandler;

/// Completion for data requests and uploads.
///
/// Called once per scheduling; a retried request calls it again.
pub type Completion = Arc<dyn Fn(Result<Response, RequestFailure>) + Send + Sync>;

/// Completion for downloads.
pub type DownloadCompletion = Arc<dyn Fn(Result<Download, RequestFailure>) + Send + Sync>;

/// Where upload bytes come from.
#[derive(Debug, Clone)]
pub(crate) enum UploadSource {
    File(PathBuf),
    Data(Arc<Vec<u8>>),
}

#[derive(Clone)]
pub(crate) enum JobKind {
    Data {
        completion: Completion,
    },
    Upload {
        source: UploadSource,
        progress: Option<ProgressHandler>,
        completion: Completion,
    },
    Download {
        progress: Option<ProgressHandler>,
        completion: DownloadCompletion,
    },
}

/// A request paired with what to do when it finishes.
#[derive(Clone)]
pub(crate) struct Job {
    pub(crate) request: Request,
    pub(crate) kind: JobKind,
}

impl Job {
    pub(crate) fn data(request: Request, completion: Completion) -> Self {
        Self {
            request,
            kind: JobKind::Data { completion },
        }
    }

    /// Returns a copy with the request transformed.
    #[must_use]
    pub(crate) fn map_request(self, f: impl FnOnce(&Request) -> Request) -> Self {
        Self {
            request: f(&self.request),
            kind: self.kind,
        }
    }

    /// Wraps the completion so `done` fires once it has run for the first time.
    #[must_use]
    pub(crate) fn signal_when_done(self, done: oneshot::Sender<()>) -> Self {
        let done = Mutex::new(Some(done));
        let signal = move || {
            if let Some(done) = done.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = done.send(());
            }
        };

        let kind = match self.kind {
            JobKind::Data { completion } => JobKind::Data {
                completion: Arc::new(move |result: Result<Response, RequestFailure>| {
                    completion(result);
                    signal();
                }),
            },
            JobKind::Upload {
                source,
                progress,
                completion,
            } => JobKind::Upload {
                source,
                progress,
                completion: Arc::new(move |result: Result<Response, RequestFailure>| {
                    completion(result);
                    signal();
                }),
            },
            JobKind::Download { progress, completion } => JobKind::Download {
                progress,
                completion: Arc::new(move |result: Result<Download, RequestFailure>| {
                    completion(result);
                    signal();
                }),
            },
        };
        Self {
            request: self.request,
            kind,
        }
    }

    /// Transfers always run on the background tier.
    pub(crate) fn tier(&self) -> SessionTier {
        match self.kind {
            JobKind::Data { .. } => self.request.tier(),
            JobKind::Upload { .. } | JobKind::Download { .. } => SessionTier::Background,
        }
    }

    pub(crate) fn progress(&self) -> Option<ProgressHandler> {
        match &self.kind {
            JobKind::Data { .. } => None,
            JobKind::Upload { progress, .. } | JobKind::Download { progress, .. } => progress.clone(),
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self.kind {
            JobKind::Data { .. } => "data",
            JobKind::Upload { .. } => "upload",
            JobKind::Download { .. } => "download",
        }
    }

    /// Queues the success completion.
    pub(crate) fn succeed(self, response: Response, location: Option<PathBuf>, callbacks: &CallbackQueue) {
        match self.kind {
            JobKind::Data { completion } | JobKind::Upload { completion, .. } => {
                callbacks.dispatch(move || completion(Ok(response)));
            }
            JobKind::Download { completion, .. } => {
                let download = Download {
                    response,
                    location: location.unwrap_or_default(),
                };
                callbacks.dispatch(move || completion(Ok(download)));
            }
        }
    }

    /// Queues the failure completion.
    pub(crate) fn fail(self, failure: RequestFailure, callbacks: &CallbackQueue) {
        match self.kind {
            JobKind::Data { completion } | JobKind::Upload { completion, .. } => {
                callbacks.dispatch(move || completion(Err(failure)));
            }
            JobKind::Download { completion, .. } => {
                callbacks.dispatch(move || completion(Err(failure)));
            }
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("kind", &self.kind_name())
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}
