//! CLI command definitions and handlers.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Load configuration with graceful fallback to defaults.
///
/// A missing or unreadable config file never blocks a session; the problem
/// is logged and the defaults are used instead.
pub fn load_config() -> napkin_core::config::Config {
    napkin_core::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring configuration file: {}", e);
        napkin_core::config::Config::default()
    })
}

pub mod config;
pub mod serve;

/// Napkin - receive photographed notes from a phone over the local network
#[derive(Parser)]
#[command(name = "napkin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Start an upload session and save incoming images
    Serve(ServeArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the serve command
#[derive(Parser)]
pub struct ServeArgs {
    /// First port to try
    #[arg(long)]
    pub start: Option<u16>,

    /// Last port to try
    #[arg(long)]
    pub end: Option<u16>,

    /// Directory for received images
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Host name or address to advertise instead of the detected LAN address
    #[arg(long)]
    pub host: Option<String>,

    /// Stop the session after this long (e.g., 30s, 5m, 1h; 0s disables)
    #[arg(short, long)]
    pub timeout: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Do not print the QR code
    #[arg(long)]
    pub no_qr: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Show all configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Reset configuration to defaults
    Reset,
}
