//! # Napkin Core Library
//!
//! `napkin-core` provides the ephemeral upload server used to pull photos of
//! physical notes from a phone into a desktop host over the local network.
//!
//! ## Features
//!
//! - **Port negotiation**: scans a configured range for the first free port
//! - **One-time tokens**: every session mints a fresh random access token
//! - **Multipart ingest**: each uploaded file is handed to the host as soon
//!   as its bytes are in
//! - **Explicit lifecycle**: `stop()` force-closes lingering sockets and
//!   releases the port before returning
//!
//! ## Modules
//!
//! - [`config`] - Configuration management
//! - [`crypto`] - Session token generation and comparison
//! - [`error`] - Error types
//! - [`network`] - LAN address resolution for the shareable URL
//! - [`platform`] - Capability detection for sockets and interfaces
//! - [`port`] - Port ranges and free-port negotiation
//! - [`qr`] - QR rendering of the session URL
//! - [`web`] - The upload server itself
//!
//! ## Example
//!
//! ```rust,ignore
//! use napkin_core::port::PortRange;
//! use napkin_core::web::UploadServer;
//!
//! let (mut server, mut uploads) = UploadServer::channel();
//! let info = server.start(PortRange::new(8080, 8090)?).await?;
//! println!("Scan to connect: {}", info.url);
//!
//! while let Some(event) = uploads.recv().await {
//!     println!("{}: {} bytes", event.filename, event.payload.len());
//! }
//! server.stop().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod network;
pub mod platform;
pub mod port;
pub mod qr;
pub mod web;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default port range start
pub const DEFAULT_PORT_START: u16 = 8080;

/// Default port range end
pub const DEFAULT_PORT_END: u16 = 8090;

/// Default maximum size of a single upload request body (64 MiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Default session timeout in seconds
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 300;

/// Filename used when an uploaded part carries none
pub const DEFAULT_UPLOAD_FILENAME: &str = "image.jpg";

/// Bytes of randomness behind each session token
pub const TOKEN_BYTES: usize = 16;
