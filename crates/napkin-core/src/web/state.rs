//! Per-session state shared by all HTTP handlers.

use std::sync::Arc;

use crate::config::CallbackFailurePolicy;
use crate::crypto::constant_time_eq;

use super::events::Callbacks;

/// State of one upload session. Immutable once the server is listening.
pub struct AppState {
    token: String,
    /// Host callbacks
    pub callbacks: Callbacks,
    /// How a failed upload callback is reported to the client
    pub callback_failure: CallbackFailurePolicy,
}

impl AppState {
    /// Create the state for a session guarded by `token`.
    #[must_use]
    pub fn new(token: String, callbacks: Callbacks, callback_failure: CallbackFailurePolicy) -> Self {
        Self {
            token,
            callbacks,
            callback_failure,
        }
    }

    /// Check a client-supplied token against the session token.
    #[must_use]
    pub fn token_matches(&self, candidate: Option<&str>) -> bool {
        candidate.is_some_and(|c| constant_time_eq(c.as_bytes(), self.token.as_bytes()))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("token", &"<redacted>")
            .field("callback_failure", &self.callback_failure)
            .finish_non_exhaustive()
    }
}

/// Type alias for shared state across handlers.
pub type SharedState = Arc<AppState>;
