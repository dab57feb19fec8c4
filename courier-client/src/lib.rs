// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Courier Client
//!
//! Request scheduling and HTTP transport for Courier.
//!
//! A [`RequestController`] is created once per API endpoint and shared. It
//! renders [`Request`]s, hands them to a [`Transport`], classifies the
//! results, and delivers completions on a [`CallbackQueue`].
//!
//! ## Credential gating
//!
//! When an [`Authenticator`](courier_core::Authenticator) is installed, every
//! request first passes an authentication gate:
//!
//! - no credential, or a credential that has not expired: dispatch now;
//! - expired credential and no refresh running: this request starts the
//!   refresh and dispatches once it resolves;
//! - refresh running: the request waits in a queue and is resubmitted, in
//!   arrival order, when the refresh resolves.
//!
//! At most one refresh runs at a time per controller.
//!
//! ## Example
//!
//! ```ignore
//! use courier_client::{RequestController, body::JsonBody};
//! use courier_core::HttpMethod;
//!
//! let controller = RequestController::new("https://api.example.com")?;
//! let response = controller.get("users").await?;
//! println!("{}", response.status());
//!
//! let request = controller
//!     .new_request(HttpMethod::Post, "users")
//!     .body(JsonBody::new(serde_json::json!({"name": "amy"})))
//!     .build();
//! controller.schedule(request, |result| match result {
//!     Ok(response) => println!("created: {}", response.status()),
//!     Err(failure) => eprintln!("failed: {failure}"),
//! });
//! ```

pub mod body;
pub mod callback;
pub mod controller;
pub mod error;
mod gate;
mod job;
pub mod observer;
pub mod recovery;
pub mod request;
pub mod response;
pub mod settings;
mod tasks;
pub mod transport;

// Errors
pub use error::{RequestError, TransportError};

// Controller
pub use callback::CallbackQueue;
pub use controller::{
    CREDENTIAL_NAMESPACE, RequestController, RequestControllerBuilder, RequestOptions,
    default_credential_identifier,
};
pub use job::{Completion, DownloadCompletion};
pub use observer::{ActivityCounter, ActivityObserver, RequestObserver};
pub use recovery::{RecoveryKind, RecoveryOption, RequestFailure};
pub use settings::{ClientSettings, DEFAULT_USER_AGENT};

// Requests & responses
pub use request::{Headers, Request, RequestBuilder, SessionTier, WireRequest, normalize_base_url};
pub use response::{Download, Response};

// Transport
pub use transport::{
    DispatchedRequest, MockResponse, MockTransport, Progress, ProgressHandler, ReqwestTransport,
    TaskId, Transport, TransportResponse,
};
