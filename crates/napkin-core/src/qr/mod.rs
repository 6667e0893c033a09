//! QR code rendering for session URLs.
//!
//! The session URL (host, port and token) reaches the phone out-of-band by
//! being scanned from the desktop screen.
//!
//! ## Features
//!
//! - ASCII art QR for terminal display
//! - SVG QR for embedding in a host UI
//!
//! ## Example
//!
//! ```rust,ignore
//! use napkin_core::qr;
//!
//! let ascii = qr::generate_ascii(&info.url)?;
//! println!("{}", ascii);
//! ```

use qrcode::render::{svg, unicode};
use qrcode::{EcLevel, QrCode};

use crate::error::{Error, Result};

fn encode(url: &str) -> Result<QrCode> {
    QrCode::with_error_correction_level(url, EcLevel::M)
        .map_err(|e| Error::Internal(format!("Failed to generate QR code: {e}")))
}

/// Generate ASCII art QR code for terminal display.
///
/// Uses Unicode half-block characters so two QR rows fit in one terminal
/// line.
///
/// # Errors
///
/// Returns an error if the URL is too long to encode.
///
/// # Example
///
/// ```
/// use napkin_core::qr::generate_ascii;
///
/// let qr = generate_ascii("http://192.168.1.2:8080/?token=abc").unwrap();
/// assert!(qr.lines().count() > 5);
/// ```
pub fn generate_ascii(url: &str) -> Result<String> {
    let rendered = encode(url)?
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    Ok(rendered)
}

/// Generate an SVG QR code.
///
/// # Errors
///
/// Returns an error if the URL is too long to encode.
///
/// # Example
///
/// ```
/// use napkin_core::qr::generate_svg;
///
/// let svg = generate_svg("http://192.168.1.2:8080/?token=abc").unwrap();
/// assert!(svg.contains("</svg>"));
/// ```
pub fn generate_svg(url: &str) -> Result<String> {
    let svg_string = encode(url)?
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    Ok(svg_string)
}
