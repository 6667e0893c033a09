//! Serve command implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::sync::mpsc;

use napkin_core::config::parse_duration;
use napkin_core::port::PortRange;
use napkin_core::web::{UploadEvent, UploadServer, WebServerConfig};

use super::ServeArgs;
use crate::store::ImageStore;
use crate::ui::{format_remaining, format_size, SessionBox};

/// Run the serve command.
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = super::load_config();

    let range = resolve_range(args.start, args.end, config.server.port_range)?;
    let timeout = match args.timeout.as_deref() {
        Some(s) => parse_duration(s).with_context(|| format!("Invalid timeout '{}'", s))?,
        None => config.server.session_timeout,
    };
    if let Some(host) = args.host {
        config.server.advertise_host = Some(host);
    }

    let output_dir = args
        .output
        .or_else(|| config.storage.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let store = ImageStore::new(output_dir, config.storage.file_prefix.clone());

    let json = args.json;
    let (server, mut uploads) = UploadServer::channel();
    let mut server = server
        .with_config(WebServerConfig::from(&config.server))
        .on_connect(move |info| {
            if !json {
                println!(
                    "  Phone connected{}",
                    info.user_agent
                        .map(|ua| format!(" ({})", ua))
                        .unwrap_or_default()
                );
            }
        });

    let info = match server.start(range).await {
        Ok(info) => info,
        Err(e) => {
            print_suggestion(&e);
            return Err(e).context("Failed to start upload server");
        }
    };

    if json {
        let output = serde_json::json!({
            "port": info.port,
            "token": info.token,
            "url": info.url,
            "output_dir": store.dir().display().to_string(),
            "timeout_secs": timeout.as_secs(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        let mut session_box = SessionBox::new(&info.url).with_qr(!args.no_qr);
        if !timeout.is_zero() {
            session_box = session_box.with_expire(timeout);
        }
        session_box.display();
        println!();
        println!("  Saving to {}", store.dir().display());
        println!("  Press Ctrl+C to stop.");
        println!();
    }

    let expired = session_expiry(timeout);
    tokio::pin!(expired);

    let mut saved = 0usize;
    let reason = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break "interrupted",
            () = &mut expired => break "timed_out",
            Some(upload) = uploads.recv() => {
                if save_upload(&store, &upload, json).await? {
                    saved += 1;
                }
            }
        }
    };

    let session_length = server
        .session()
        .map(|session| session.elapsed())
        .unwrap_or_default();
    server.stop().await;
    // Uploads acknowledged before shutdown may still be queued
    saved += save_pending(&store, &mut uploads, json).await?;

    if json {
        let output = serde_json::json!({
            "status": "stopped",
            "reason": reason,
            "saved": saved,
            "duration_secs": session_length.as_secs(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        if reason == "timed_out" {
            println!("Session timed out.");
        }
        println!(
            "Server stopped after {}. {} image(s) saved.",
            format_remaining(session_length),
            saved
        );
    }

    Ok(())
}

/// Write one upload to the store and report it. Returns whether it was saved.
async fn save_upload(store: &ImageStore, upload: &UploadEvent, json: bool) -> Result<bool> {
    match store
        .save(&upload.filename, &upload.payload, &Local::now())
        .await
    {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Saved upload");
            if json {
                let output = serde_json::json!({
                    "event": "saved",
                    "path": path.display().to_string(),
                    "bytes": upload.payload.len(),
                });
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!(
                    "  Saved {} ({})",
                    path.display(),
                    format_size(upload.payload.len())
                );
            }
            Ok(true)
        }
        Err(e) => {
            tracing::error!("Failed to save {}: {}", upload.filename, e);
            Ok(false)
        }
    }
}

/// Save uploads still queued once the server has stopped.
async fn save_pending(
    store: &ImageStore,
    uploads: &mut mpsc::UnboundedReceiver<UploadEvent>,
    json: bool,
) -> Result<usize> {
    let mut saved = 0;
    while let Ok(upload) = uploads.try_recv() {
        if save_upload(store, &upload, json).await? {
            saved += 1;
        }
    }
    if saved > 0 {
        tracing::debug!(saved, "Saved uploads queued at shutdown");
    }
    Ok(saved)
}

fn print_suggestion(err: &napkin_core::Error) {
    if let Some(suggestion) = err.suggestion() {
        eprintln!();
        eprintln!("Suggestion:");
        for line in suggestion.lines() {
            eprintln!("  {line}");
        }
        eprintln!();
    }
}

/// Merge command-line port bounds with the configured range.
fn resolve_range(start: Option<u16>, end: Option<u16>, configured: PortRange) -> Result<PortRange> {
    let start = start.unwrap_or_else(|| configured.start());
    let end = end.unwrap_or_else(|| configured.end().max(start));
    PortRange::new(start, end).with_context(|| format!("Invalid port range {}-{}", start, end))
}

/// Resolves when the session timeout elapses; never when it is zero.
async fn session_expiry(timeout: Duration) {
    if timeout.is_zero() {
        std::future::pending::<()>().await;
    } else {
        tokio::time::sleep(timeout).await;
    }
}
