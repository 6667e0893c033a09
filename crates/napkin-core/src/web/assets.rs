//! Static upload page served using rust-embed.
//!
//! The page (HTML, CSS and script in one file) is embedded into the binary
//! at compile time. It needs no server-side templating: the token travels
//! in the query string of the URL the phone already opened.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

use super::error::ApiError;

/// Embedded static assets for the upload page.
#[derive(RustEmbed)]
#[folder = "src/web/assets/"]
#[include = "*.html"]
pub struct Assets;

/// Name of the upload page asset.
pub const UPLOAD_PAGE: &str = "index.html";

/// Serve the mobile upload page.
pub fn upload_page() -> Response {
    serve_file(UPLOAD_PAGE)
}

/// Serve a specific file from embedded assets.
fn serve_file(path: &str) -> Response {
    let Some(content) = Assets::get(path) else {
        tracing::error!("Embedded asset missing: {}", path);
        return ApiError::not_found().into_response();
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (
                header::CACHE_CONTROL,
                "no-cache, no-store, must-revalidate".to_string(),
            ),
        ],
        content.data.into_owned(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_page_embedded() {
        let page = Assets::get(UPLOAD_PAGE).expect("upload page is embedded");
        let html = String::from_utf8_lossy(&page.data);
        assert!(html.contains("/upload?token="));
        assert!(html.contains("/ping?token="));
    }

    #[test]
    fn test_upload_page_response() {
        let response = upload_page();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html"
        );
        assert!(response
            .headers()
            .get(header::CACHE_CONTROL)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("no-store"));
    }

    #[test]
    fn test_missing_asset_is_not_found() {
        assert_eq!(serve_file("missing.html").status(), StatusCode::NOT_FOUND);
    }
}
