//! HTTP error responses for the upload protocol.
//!
//! Every failure while handling a request ends here as a short plain-text
//! response; nothing propagates past the request.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// A plain-text error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    /// Create an error with an explicit status and body.
    #[must_use]
    pub const fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    /// Missing or wrong session token.
    #[must_use]
    pub const fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden")
    }

    /// No route for this method and path.
    #[must_use]
    pub const fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    /// The multipart body could not be parsed.
    #[must_use]
    pub const fn upload_failed() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
    }

    /// The bytes arrived but the host failed to process them.
    #[must_use]
    pub const fn processing_failed() -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            "Upload received but processing failed",
        )
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Get the response body.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain")],
            self.message,
        )
            .into_response()
    }
}

/// Result type for web handlers.
pub type ApiResult<T> = Result<T, ApiError>;
