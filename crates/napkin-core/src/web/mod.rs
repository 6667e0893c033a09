//! Ephemeral upload server.
//!
//! One [`UploadServer`] owns at most one listening session at a time. A
//! session binds the first free port of a [`PortRange`], mints a fresh
//! token, and serves the upload page plus the upload endpoint until
//! [`UploadServer::stop`] force-closes every connection and frees the port.
//!
//! ## Example
//!
//! ```rust,no_run
//! use napkin_core::port::PortRange;
//! use napkin_core::web::UploadServer;
//!
//! # async fn example() -> napkin_core::Result<()> {
//! let (mut server, mut uploads) = UploadServer::channel();
//! let info = server.start(PortRange::default()).await?;
//! println!("Open {} on your phone", info.url);
//!
//! if let Some(upload) = uploads.recv().await {
//!     println!("{} ({} bytes)", upload.filename, upload.payload.len());
//! }
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod error;
pub mod events;
pub mod handlers;
pub mod state;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, extract::ConnectInfo, Router};
use chrono::{DateTime, Utc};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tower::ServiceExt;

use crate::config::{CallbackFailurePolicy, ServerConfig};
use crate::error::{Error, Result};
use crate::platform::Capabilities;
use crate::port::{PortNegotiator, PortRange, SocketProbe};
use crate::{crypto, network};

pub use events::{CallbackError, CallbackResult, Callbacks, ConnectionInfo, UploadEvent};
pub use state::{AppState, SharedState};

/// Lifecycle state of an [`UploadServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// No session
    Idle,
    /// Negotiating a port and binding
    Starting,
    /// Accepting connections
    Listening,
    /// Draining and force-closing connections
    Stopping,
}

/// What the host needs to hand the session to a phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Bound port
    pub port: u16,
    /// Session token (32 lowercase hex characters)
    pub token: String,
    /// `http://<host>:<port>/?token=<token>`
    pub url: String,
}

/// The active session of a listening server.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bound port
    pub port: u16,
    /// Session token
    pub token: String,
    /// When the session began listening
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Time since the session began listening.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or_default()
    }
}

/// Tunables for an upload server.
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Maximum size of one upload request body, in bytes
    pub max_upload_size: usize,
    /// How long `stop()` lets in-flight requests finish
    pub shutdown_grace: Duration,
    /// Response policy for failed upload callbacks
    pub callback_failure: CallbackFailurePolicy,
    /// Host advertised in the session URL; detected when `None`
    pub advertise_host: Option<String>,
    /// What the runtime environment allows
    pub capabilities: Capabilities,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for WebServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_upload_size: config.max_upload_size,
            shutdown_grace: config.shutdown_grace,
            callback_failure: config.callback_failure,
            advertise_host: config.advertise_host.clone(),
            capabilities: Capabilities::detect(),
        }
    }
}

struct RunningServer {
    session: Session,
    shutdown: oneshot::Sender<Duration>,
    task: JoinHandle<()>,
    open_connections: Arc<AtomicUsize>,
}

/// Local HTTP server that receives images from a phone on the same LAN.
pub struct UploadServer {
    config: WebServerConfig,
    callbacks: Callbacks,
    state: ServerState,
    running: Option<RunningServer>,
}

impl UploadServer {
    /// Create a server that hands every uploaded file to `on_upload`.
    pub fn new<F>(on_upload: F) -> Self
    where
        F: Fn(UploadEvent) -> CallbackResult + Send + Sync + 'static,
    {
        Self::with_callbacks(Callbacks::new(on_upload))
    }

    /// Create a server from a prepared callback set.
    #[must_use]
    pub fn with_callbacks(callbacks: Callbacks) -> Self {
        Self {
            config: WebServerConfig::default(),
            callbacks,
            state: ServerState::Idle,
            running: None,
        }
    }

    /// Create a server whose uploads are delivered through a channel.
    ///
    /// Once the receiver is dropped, uploads count as callback failures.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let server = Self::new(move |event| {
            tx.send(event)
                .map_err(|_| CallbackError::from("upload receiver dropped"))
        });
        (server, rx)
    }

    /// Register a callback for clients opening the upload page.
    #[must_use]
    pub fn on_connect<F>(mut self, on_connect: F) -> Self
    where
        F: Fn(ConnectionInfo) + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.clone().with_on_connect(on_connect);
        self
    }

    /// Replace the server tunables. Takes effect on the next `start()`.
    #[must_use]
    pub fn with_config(mut self, config: WebServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Current tunables.
    #[must_use]
    pub const fn config(&self) -> &WebServerConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Whether a session is listening.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// The active session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.running.as_ref().map(|r| &r.session)
    }

    /// Number of client connections currently open.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.running
            .as_ref()
            .map_or(0, |r| r.open_connections.load(Ordering::SeqCst))
    }

    /// Bind the first free port in `range` and start accepting uploads.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyRunning`] if a session is active
    /// - [`Error::Unsupported`] if the environment cannot open sockets
    /// - [`Error::NoAvailablePorts`] if every port in `range` is taken
    pub async fn start(&mut self, range: PortRange) -> Result<ServerInfo> {
        if self.running.is_some() {
            return Err(Error::AlreadyRunning);
        }
        self.config.capabilities.require_sockets()?;

        self.state = ServerState::Starting;
        tracing::info!("Starting upload server in port range {}", range);

        match self.launch(range).await {
            Ok((running, info)) => {
                self.running = Some(running);
                self.state = ServerState::Listening;
                Ok(info)
            }
            Err(e) => {
                self.state = ServerState::Idle;
                Err(e)
            }
        }
    }

    async fn launch(&self, range: PortRange) -> Result<(RunningServer, ServerInfo)> {
        let listener = bind_in_range(range).await?;
        let port = listener.local_addr()?.port();
        let token = crypto::generate_token();

        let state = Arc::new(AppState::new(
            token.clone(),
            self.callbacks.clone(),
            self.config.callback_failure,
        ));
        let app = handlers::router(state, self.config.max_upload_size);

        let (shutdown, shutdown_rx) = oneshot::channel();
        let open_connections = Arc::new(AtomicUsize::new(0));
        let task = tokio::spawn(serve(
            listener,
            app,
            shutdown_rx,
            Arc::clone(&open_connections),
        ));

        let host = self
            .config
            .advertise_host
            .clone()
            .unwrap_or_else(|| network::local_ip(self.config.capabilities));
        let url = session_url(&host, port, &token);
        tracing::info!(port, host = %host, "Upload server listening");

        let session = Session {
            port,
            token: token.clone(),
            created_at: Utc::now(),
        };
        Ok((
            RunningServer {
                session,
                shutdown,
                task,
                open_connections,
            },
            ServerInfo { port, token, url },
        ))
    }

    /// Stop the session, force-closing every open connection.
    ///
    /// Resolves once the port is released. Calling it while idle is a no-op.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            tracing::debug!("Stop requested with no active session");
            return;
        };

        self.state = ServerState::Stopping;
        tracing::info!(port = running.session.port, "Stopping upload server");

        // The accept loop may already be gone; awaiting the task covers both
        let _ = running.shutdown.send(self.config.shutdown_grace);
        if let Err(e) = running.task.await {
            tracing::warn!("Upload server task ended abnormally: {}", e);
        }

        self.state = ServerState::Idle;
        tracing::info!("Upload server stopped");
    }
}

impl Drop for UploadServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}

impl std::fmt::Debug for UploadServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadServer")
            .field("state", &self.state)
            .field("port", &self.session().map(|s| s.port))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Format the URL a phone opens to join a session.
#[must_use]
pub fn session_url(host: &str, port: u16, token: &str) -> String {
    format!("http://{host}:{port}/?token={token}")
}

/// Bind the first port of `range` that both the probe and the real bind accept.
async fn bind_in_range(range: PortRange) -> Result<TcpListener> {
    let negotiator = PortNegotiator::new(SocketProbe);
    let mut candidates = Some(range);

    while let Some(remaining) = candidates {
        let Ok(port) = negotiator.find(remaining) else {
            break;
        };
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                tracing::debug!(port, "Port taken between probe and bind: {}", e);
                candidates = remaining.after(port);
            }
        }
    }

    Err(Error::NoAvailablePorts {
        start: range.start(),
        end: range.end(),
    })
}

/// Pause after a failed `accept()` so errors like EMFILE do not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Accept loop. Owns the listener and every connection task.
async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: oneshot::Receiver<Duration>,
    open_connections: Arc<AtomicUsize>,
) {
    let mut connections = JoinSet::new();

    let grace = loop {
        tokio::select! {
            grace = &mut shutdown => break grace.unwrap_or_default(),
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    tracing::debug!(%remote, "Accepted connection");
                    open_connections.fetch_add(1, Ordering::SeqCst);
                    connections.spawn(serve_connection(stream, remote, app.clone()));
                }
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            Some(result) = connections.join_next(), if !connections.is_empty() => {
                open_connections.fetch_sub(1, Ordering::SeqCst);
                if let Err(e) = result {
                    tracing::warn!("Connection task failed: {}", e);
                }
            }
        }
    };

    // Let in-flight requests finish within the grace period, then cut the rest
    if !grace.is_zero() && !connections.is_empty() {
        let drain = async {
            while connections.join_next().await.is_some() {
                open_connections.fetch_sub(1, Ordering::SeqCst);
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::debug!("Grace period elapsed with connections still open");
        }
    }

    let remaining = connections.len();
    connections.abort_all();
    while connections.join_next().await.is_some() {}
    open_connections.store(0, Ordering::SeqCst);
    drop(listener);

    tracing::debug!(force_closed = remaining, "All connections closed");
}

/// Serve HTTP/1.1 on one client socket until it closes or is aborted.
async fn serve_connection(stream: TcpStream, remote: SocketAddr, app: Router) {
    let service = hyper::service::service_fn(move |request: hyper::Request<Incoming>| {
        let app = app.clone();
        async move {
            let (mut parts, body) = request.into_parts();
            parts.extensions.insert(ConnectInfo(remote));
            app.oneshot(axum::extract::Request::from_parts(parts, Body::new(body)))
                .await
        }
    });

    if let Err(e) = hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        tracing::debug!(%remote, "Connection ended with error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url() {
        assert_eq!(
            session_url("192.168.1.20", 8080, "abc"),
            "http://192.168.1.20:8080/?token=abc"
        );
    }

    #[test]
    fn test_new_server_is_idle() {
        let server = UploadServer::new(|_| Ok(()));
        assert_eq!(server.state(), ServerState::Idle);
        assert!(!server.is_running());
        assert!(server.session().is_none());
        assert_eq!(server.open_connections(), 0);
    }

    #[test]
    fn test_on_connect_builder_keeps_upload_callback() {
        let uploads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&uploads);
        let server = UploadServer::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .on_connect(|_| {});

        server
            .callbacks
            .dispatch_upload(UploadEvent {
                filename: "a.jpg".into(),
                payload: b"x".to_vec(),
            })
            .unwrap();
        assert_eq!(uploads.load(Ordering::SeqCst), 1);
        assert!(!server.is_running());
    }

    #[test]
    fn test_config_from_server_config() {
        let mut server_config = ServerConfig::default();
        server_config.shutdown_grace = Duration::from_secs(3);
        server_config.callback_failure = CallbackFailurePolicy::Report;

        let config = WebServerConfig::from(&server_config);
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
        assert_eq!(config.callback_failure, CallbackFailurePolicy::Report);
        assert_eq!(config.max_upload_size, crate::DEFAULT_MAX_UPLOAD_SIZE);
    }

    #[tokio::test]
    async fn test_start_without_sockets_is_unsupported() {
        let mut server = UploadServer::new(|_| Ok(())).with_config(WebServerConfig {
            capabilities: Capabilities::sandboxed(),
            ..WebServerConfig::default()
        });

        let result = server.start(PortRange::default()).await;
        assert!(matches!(result, Err(Error::Unsupported(_))));
        assert_eq!(server.state(), ServerState::Idle);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let mut server = UploadServer::new(|_| Ok(()));
        server.stop().await;
        server.stop().await;
        assert_eq!(server.state(), ServerState::Idle);
    }
}
