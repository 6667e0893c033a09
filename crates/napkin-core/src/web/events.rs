//! Events the upload server raises to its host.
//!
//! The host registers an `on_upload` callback (required) and an
//! `on_connect` callback (optional). Both run on the request's task, so
//! they must return quickly; hand heavy work to another task, e.g. through
//! [`super::UploadServer::channel`]. A callback that errors or panics is
//! logged and never takes the request handler down with it.

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// One uploaded file, raised as soon as its bytes are fully received.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadEvent {
    /// Client-supplied file name, or [`crate::DEFAULT_UPLOAD_FILENAME`]
    pub filename: String,
    /// Raw decoded file contents
    pub payload: Vec<u8>,
}

impl fmt::Debug for UploadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadEvent")
            .field("filename", &self.filename)
            .field("bytes", &self.payload.len())
            .finish()
    }
}

/// A client that opened the upload page.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Peer socket address, when known
    pub remote_address: Option<SocketAddr>,
    /// `User-Agent` header, when sent
    pub user_agent: Option<String>,
    /// Request target as received (includes the token query)
    pub request_url: String,
    /// When the page was requested
    pub timestamp: DateTime<Utc>,
}

/// Error type returned by upload callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by upload callbacks.
pub type CallbackResult = Result<(), CallbackError>;

type UploadFn = dyn Fn(UploadEvent) -> CallbackResult + Send + Sync;
type ConnectFn = dyn Fn(ConnectionInfo) + Send + Sync;

/// The host's callbacks, shared by every request of a session.
#[derive(Clone)]
pub struct Callbacks {
    on_upload: Arc<UploadFn>,
    on_connect: Option<Arc<ConnectFn>>,
}

impl Callbacks {
    /// Create callbacks with the given upload consumer.
    pub fn new<F>(on_upload: F) -> Self
    where
        F: Fn(UploadEvent) -> CallbackResult + Send + Sync + 'static,
    {
        Self {
            on_upload: Arc::new(on_upload),
            on_connect: None,
        }
    }

    /// Register a consumer for page-load observations.
    #[must_use]
    pub fn with_on_connect<F>(mut self, on_connect: F) -> Self
    where
        F: Fn(ConnectionInfo) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(on_connect));
        self
    }

    /// Hand one event to the upload consumer.
    ///
    /// Returns the consumer's failure, including a panic, as a message.
    pub(crate) fn dispatch_upload(&self, event: UploadEvent) -> Result<(), String> {
        match catch_unwind(AssertUnwindSafe(|| (self.on_upload)(event))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(panic_message(panic.as_ref())),
        }
    }

    /// Report a page load; failures are logged and dropped.
    pub(crate) fn notify_connect(&self, info: ConnectionInfo) {
        let Some(on_connect) = &self.on_connect else {
            return;
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| on_connect(info))) {
            tracing::warn!(
                "Connect callback panicked: {}",
                panic_message(panic.as_ref())
            );
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_connect", &self.on_connect.is_some())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(
            || "callback panicked".to_string(),
            |msg| format!("callback panicked: {msg}"),
        )
}
