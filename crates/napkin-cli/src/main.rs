//! Napkin CLI - pull photos of paper notes from a phone onto this machine
//!
//! Napkin starts a short-lived upload server on the local network and shows
//! a QR code. Scanning it on a phone opens a page that sends photos straight
//! into a folder on the desktop.
//!
//! ## Quick Start
//!
//! ```bash
//! # Receive notes into ./notes, stopping after ten minutes
//! napkin serve --output ./notes --timeout 10m
//!
//! # Inspect configuration
//! napkin config show
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;
mod store;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => commands::serve::run(args).await,
        Command::Config(args) => commands::config::run(args).await,
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,napkin=info,napkin_core=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
