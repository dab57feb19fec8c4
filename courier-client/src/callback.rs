//! Where completions run.
//!
//! Transport work happens on runtime worker threads; completions are handed to
//! a [`CallbackQueue`] so callers see them on one predictable thread.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

/// A queued callback.
pub type Callback = Box<dyn FnOnce() + Send>;

#[derive(Clone)]
enum Kind {
    Serial(mpsc::UnboundedSender<Callback>),
    Inline,
    Custom(Arc<dyn Fn(Callback) + Send + Sync>),
}

/// Executes completion callbacks.
#[derive(Clone)]
pub struct CallbackQueue {
    kind: Kind,
}

impl CallbackQueue {
    /// Runs callbacks in FIFO order on a dedicated thread.
    ///
    /// The thread exits once every clone of the queue has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn dedicated(name: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Callback>();
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(callback) = rx.blocking_recv() {
                    run(callback);
                }
                debug!("Callback queue closed");
            })?;
        Ok(Self {
            kind: Kind::Serial(tx),
        })
    }

    /// Runs callbacks immediately on whichever thread finishes the request.
    pub fn inline() -> Self {
        Self { kind: Kind::Inline }
    }

    /// Hands callbacks to a host-provided executor, such as a UI event loop.
    pub fn custom(executor: impl Fn(Callback) + Send + Sync + 'static) -> Self {
        Self {
            kind: Kind::Custom(Arc::new(executor)),
        }
    }

    /// Queues a callback.
    pub fn dispatch(&self, callback: impl FnOnce() + Send + 'static) {
        match &self.kind {
            Kind::Serial(tx) => {
                if let Err(mpsc::error::SendError(callback)) = tx.send(Box::new(callback)) {
                    // Worker thread has exited.
                    run(callback);
                }
            }
            Kind::Inline => run(Box::new(callback)),
            Kind::Custom(executor) => executor(Box::new(callback)),
        }
    }
}

fn run(callback: Callback) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!("Completion callback panicked");
    }
}

impl fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            Kind::Serial(_) => "dedicated",
            Kind::Inline => "inline",
            Kind::Custom(_) => "custom",
        };
        f.debug_struct("CallbackQueue").field("kind", &kind).finish()
    }
}
