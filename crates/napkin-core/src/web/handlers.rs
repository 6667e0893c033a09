//! HTTP routing and handlers for the upload server.
//!
//! Every request outside an `OPTIONS` preflight must carry the session
//! token as a `token` query parameter. All responses, errors included,
//! carry permissive CORS headers.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, Query, Request, State},
    http::{
        header::{
            self, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        Method, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use chrono::Utc;
use tower_http::{limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer};

use super::assets;
use super::error::{ApiError, ApiResult};
use super::events::{ConnectionInfo, UploadEvent};
use super::state::SharedState;
use crate::config::CallbackFailurePolicy;

/// Build the router for one upload session.
pub fn router(state: SharedState, max_upload_size: usize) -> Router {
    Router::new()
        .route(
            "/",
            get(serve_upload_page).head(not_found).fallback(not_found),
        )
        .route("/ping", get(ping).head(not_found).fallback(not_found))
        .route("/upload", post(receive_upload).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_size))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .layer(cors_header(ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .layer(cors_header(
            ACCESS_CONTROL_ALLOW_METHODS,
            "GET, POST, OPTIONS",
        ))
        .layer(cors_header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .with_state(state)
}

fn cors_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

/// Answer preflights, then reject anything without the session token.
async fn require_token(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    // First `token` wins when the key is repeated
    let token = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(pairs)| {
            pairs
                .into_iter()
                .find_map(|(key, value)| (key == "token").then_some(value))
        });

    if !state.token_matches(token.as_deref()) {
        tracing::debug!(
            method = %request.method(),
            path = request.uri().path(),
            "Rejected request without valid token"
        );
        return ApiError::forbidden().into_response();
    }

    next.run(request).await
}

/// `GET /`: serve the upload page and report the client to the host.
async fn serve_upload_page(State(state): State<SharedState>, request: Request) -> Response {
    let info = ConnectionInfo {
        remote_address: request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
        user_agent: request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        request_url: request.uri().to_string(),
        timestamp: Utc::now(),
    };

    tracing::info!(
        remote = ?info.remote_address,
        user_agent = info.user_agent.as_deref().unwrap_or("unknown"),
        "Client opened upload page"
    );
    state.callbacks.notify_connect(info);

    assets::upload_page()
}

/// `GET /ping`: liveness probe polled by the page.
async fn ping() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// `POST /upload`: stream a multipart body and raise one event per file.
async fn receive_upload(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("Upload rejected before parsing: {}", e);
        ApiError::upload_failed()
    })?;

    let mut received = 0usize;
    let mut failed = 0usize;

    loop {
        let field = multipart.next_field().await.map_err(|e| {
            tracing::warn!("Malformed multipart body: {}", e);
            ApiError::upload_failed()
        })?;
        let Some(mut field) = field else {
            break;
        };

        let filename = field.file_name().map(str::to_string);
        if filename.is_none() && field.content_type().is_none() {
            // Plain form value, not a file
            continue;
        }
        let filename = filename
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| crate::DEFAULT_UPLOAD_FILENAME.to_string());

        let mut payload = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| {
            tracing::warn!("Upload of {} interrupted: {}", filename, e);
            ApiError::upload_failed()
        })? {
            payload.extend_from_slice(&chunk);
        }

        tracing::info!(filename = %filename, bytes = payload.len(), "Received upload");
        received += 1;

        if let Err(e) = state
            .callbacks
            .dispatch_upload(UploadEvent { filename, payload })
        {
            tracing::error!("Upload callback failed: {}", e);
            failed += 1;
        }
    }

    tracing::debug!(received, failed, "Upload request complete");

    if failed > 0 && state.callback_failure == CallbackFailurePolicy::Report {
        return Err(ApiError::processing_failed());
    }

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        "Upload successful",
    )
        .into_response())
}

/// Anything the router does not know.
async fn not_found() -> ApiError {
    ApiError::not_found()
}
