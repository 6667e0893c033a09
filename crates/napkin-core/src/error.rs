//! Error types for Napkin.
//!
//! This module provides a unified error type for the server lifecycle and
//! its supporting components. Errors raised while handling an individual
//! HTTP request never surface here; they become status codes instead (see
//! [`crate::web::error`]).

use std::io;

use thiserror::Error;

/// A specialized `Result` type for Napkin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Napkin.
#[derive(Error, Debug)]
pub enum Error {
    /// The platform cannot provide a required capability (raw sockets)
    #[error("unsupported on this platform: {0}")]
    Unsupported(String),

    /// Every port in the configured range is taken
    #[error("no available ports in range {start}-{end}")]
    NoAvailablePorts {
        /// First port of the range
        start: u16,
        /// Last port of the range (inclusive)
        end: u16,
    },

    /// Port range bounds are out of order or zero
    #[error("invalid port range {start}-{end}")]
    InvalidPortRange {
        /// First port of the range
        start: u16,
        /// Last port of the range (inclusive)
        end: u16,
    },

    /// `start()` was called on a server that is already listening
    #[error("upload server is already running")]
    AlreadyRunning,

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns a helpful suggestion for resolving the error, if applicable.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Unsupported(_) => Some(
                "The upload server needs to bind TCP sockets.\n\
                 Run it from a desktop environment instead.",
            ),
            Self::NoAvailablePorts { .. } => Some(
                "Close the application holding those ports, or widen the range:\n\
                   napkin config set port_range 8080-8190",
            ),
            Self::AlreadyRunning => Some("Stop the current session before starting a new one."),
            _ => None,
        }
    }
}
