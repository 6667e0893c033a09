//! Common test utilities for `Napkin` integration tests.
//!
//! This module provides shared functionality for integration tests.

#![allow(dead_code)]

use std::net::{Ipv4Addr, TcpListener};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use napkin_core::port::PortRange;
use napkin_core::web::UploadServer;

/// Base port for tests, advanced for each test to avoid conflicts.
static TEST_PORT_COUNTER: AtomicU16 = AtomicU16::new(47100);

/// Reserve a fresh range of `len` ports for one test.
pub fn test_port_range(len: u16) -> PortRange {
    let start = TEST_PORT_COUNTER.fetch_add(len, Ordering::SeqCst);
    PortRange::new(start, start + len - 1).expect("valid test port range")
}

/// Occupy `port` on all interfaces until the returned listener is dropped.
pub fn occupy_port(port: u16) -> TcpListener {
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).expect("Failed to occupy test port")
}

/// HTTP client that never goes through a proxy.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build HTTP client")
}

/// Loopback URL for `path` on a running server, with the token appended.
pub fn url_with_token(port: u16, path: &str, token: &str) -> String {
    format!("http://127.0.0.1:{port}{path}?token={token}")
}

/// Loopback URL for `path` without any token.
pub fn url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{port}{path}")
}

/// Multipart part holding `bytes` under field `image`.
pub fn image_part(name: &str, mime: &str, bytes: Vec<u8>) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes)
        .file_name(name.to_string())
        .mime_str(mime)
        .expect("valid mime type")
}

/// Generate random bytes for testing.
pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Poll until the server reports `expected` open connections.
pub async fn wait_for_connections(server: &UploadServer, expected: usize) {
    for _ in 0..100 {
        if server.open_connections() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {expected} open connections, found {}",
        server.open_connections()
    );
}
