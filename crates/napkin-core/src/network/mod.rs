//! Local address resolution for the shareable session URL.
//!
//! The phone reaches the server through a LAN address, so the URL shown in
//! the QR code must carry one. Resolution is best-effort: if no suitable
//! interface exists, or interfaces cannot be enumerated at all, the URL
//! falls back to `localhost`. That degrades the feature (another device
//! cannot connect) but never stops the server from starting.

use std::net::{IpAddr, Ipv4Addr};

use crate::platform::Capabilities;

/// Host used when no LAN address can be found.
pub const FALLBACK_HOST: &str = "localhost";

/// Resolve the host to advertise in the session URL.
///
/// Returns the first non-loopback IPv4 address of the machine's
/// interfaces, or [`FALLBACK_HOST`].
#[must_use]
pub fn local_ip(capabilities: Capabilities) -> String {
    if !capabilities.interfaces {
        tracing::debug!("interface enumeration unavailable, advertising localhost");
        return FALLBACK_HOST.to_string();
    }

    match if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            let addrs: Vec<IpAddr> = interfaces.iter().map(if_addrs::Interface::ip).collect();
            select_lan_ipv4(&addrs).map_or_else(
                || {
                    tracing::debug!("no LAN IPv4 address found, advertising localhost");
                    FALLBACK_HOST.to_string()
                },
                |ip| ip.to_string(),
            )
        }
        Err(e) => {
            tracing::warn!("Failed to enumerate network interfaces: {}", e);
            FALLBACK_HOST.to_string()
        }
    }
}

/// Pick the first address that another device on the LAN could reach.
///
/// IPv6, loopback and unspecified addresses are skipped.
#[must_use]
pub fn select_lan_ipv4(addrs: &[IpAddr]) -> Option<Ipv4Addr> {
    addrs.iter().find_map(|addr| match addr {
        IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Some(*v4),
        _ => None,
    })
}
