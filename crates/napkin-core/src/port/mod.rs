//! Port ranges and free-port negotiation.
//!
//! The upload server listens on the first free port of a user-configured
//! inclusive range. Ports are probed strictly in ascending order by binding
//! a throwaway listener on all interfaces and dropping it immediately, so
//! the scan is deterministic and never leaks a socket.
//!
//! ## Example
//!
//! ```rust,ignore
//! use napkin_core::port::{find_available_port, PortRange};
//!
//! let port = find_available_port(PortRange::new(8080, 8090)?)?;
//! ```

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Error, Result};

/// An inclusive, validated range of TCP ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(u16, u16)", into = "(u16, u16)")]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Create a range covering `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPortRange`] if `start` is zero or greater
    /// than `end`.
    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start == 0 || start > end {
            return Err(Error::InvalidPortRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range containing exactly one port.
    pub fn single(port: u16) -> Result<Self> {
        Self::new(port, port)
    }

    /// First port of the range.
    #[must_use]
    pub const fn start(&self) -> u16 {
        self.start
    }

    /// Last port of the range (inclusive).
    #[must_use]
    pub const fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in the range.
    #[must_use]
    pub const fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    /// Check whether `port` lies inside the range.
    #[must_use]
    pub const fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }

    /// Ports of the range in ascending order.
    #[must_use]
    pub const fn iter(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }

    /// The remainder of this range strictly above `port`, if any.
    #[must_use]
    pub fn after(&self, port: u16) -> Option<Self> {
        let next = port.checked_add(1)?.max(self.start);
        (next <= self.end).then_some(Self {
            start: next,
            end: self.end,
        })
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: crate::DEFAULT_PORT_START,
            end: crate::DEFAULT_PORT_END,
        }
    }
}

impl TryFrom<(u16, u16)> for PortRange {
    type Error = Error;

    fn try_from((start, end): (u16, u16)) -> Result<Self> {
        Self::new(start, end)
    }
}

impl From<PortRange> for (u16, u16) {
    fn from(range: PortRange) -> Self {
        (range.start, range.end)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for PortRange {
    type Err = Error;

    /// Parse `"8080-8090"` or a single port `"8080"`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidConfig {
            key: "port_range".to_string(),
            reason: format!("expected START-END, got '{s}'"),
        };
        let parse = |p: &str| p.trim().parse::<u16>().map_err(|_| invalid());

        match s.split_once('-') {
            Some((start, end)) => Self::new(parse(start)?, parse(end)?),
            None => Self::single(parse(s)?),
        }
    }
}

/// Availability check for a single port.
pub trait PortProbe {
    /// Returns `true` if a listener could be bound on `port` right now.
    fn is_available(&self, port: u16) -> bool;
}

/// Probe that binds a real throwaway socket on `0.0.0.0:port`.
///
/// On Unix the probe sets `SO_REUSEADDR`, matching the listener the server
/// binds afterwards, so ports held only by `TIME_WAIT` remnants of a
/// previous session count as free.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketProbe;

impl SocketProbe {
    fn try_bind(port: u16) -> std::io::Result<()> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        #[cfg(unix)]
        socket.set_reuse_address(true)?;
        socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;
        socket.listen(1)?;
        Ok(())
    }
}

impl PortProbe for SocketProbe {
    fn is_available(&self, port: u16) -> bool {
        match Self::try_bind(port) {
            Ok(()) => true,
            Err(e) => {
                tracing::trace!(port, error = %e, "port unavailable");
                false
            }
        }
    }
}

/// Scans a [`PortRange`] for the first free port using a [`PortProbe`].
#[derive(Debug, Clone, Default)]
pub struct PortNegotiator<P = SocketProbe> {
    probe: P,
}

impl<P: PortProbe> PortNegotiator<P> {
    /// Create a negotiator backed by the given probe.
    pub const fn new(probe: P) -> Self {
        Self { probe }
    }

    /// Return the lowest free port of `range`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAvailablePorts`] once every port has been probed
    /// without success.
    pub fn find(&self, range: PortRange) -> Result<u16> {
        range
            .iter()
            .find(|&port| self.probe.is_available(port))
            .ok_or(Error::NoAvailablePorts {
                start: range.start,
                end: range.end,
            })
    }
}

/// Find the first port of `range` that a socket can be bound to.
pub fn find_available_port(range: PortRange) -> Result<u16> {
    PortNegotiator::new(SocketProbe).find(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Probe that reports a fixed set of ports as free and records calls.
    struct FakeProbe {
        free: HashSet<u16>,
        probed: RefCell<Vec<u16>>,
    }

    impl FakeProbe {
        fn with_free(free: &[u16]) -> Self {
            Self {
                free: free.iter().copied().collect(),
                probed: RefCell::new(Vec::new()),
            }
        }
    }

    impl PortProbe for &FakeProbe {
        fn is_available(&self, port: u16) -> bool {
            self.probed.borrow_mut().push(port);
            self.free.contains(&port)
        }
    }

    #[test]
    fn test_range_validation() {
        assert!(PortRange::new(8080, 8090).is_ok());
        assert!(PortRange::new(8080, 8080).is_ok());
        assert!(matches!(
            PortRange::new(8090, 8080),
            Err(Error::InvalidPortRange {
                start: 8090,
                end: 8080
            })
        ));
        assert!(PortRange::new(0, 10).is_err());
        assert!(PortRange::new(65535, 65535).is_ok());
    }

    #[test]
    fn test_range_len_and_contains() {
        let range = PortRange::new(8080, 8090).unwrap();
        assert_eq!(range.len(), 11);
        assert!(range.contains(8080));
        assert!(range.contains(8090));
        assert!(!range.contains(8091));
        assert_eq!(range.iter().next(), Some(8080));
    }

    #[test]
    fn test_range_after() {
        let range = PortRange::new(8080, 8082).unwrap();
        assert_eq!(range.after(8080), Some(PortRange::new(8081, 8082).unwrap()));
        assert_eq!(range.after(8082), None);
        assert_eq!(range.after(9000), None);
        assert_eq!(range.after(100), Some(range));

        let top = PortRange::single(65535).unwrap();
        assert_eq!(top.after(65535), None);
    }

    #[test]
    fn test_range_parse() {
        assert_eq!(
            "8080-8090".parse::<PortRange>().unwrap(),
            PortRange::new(8080, 8090).unwrap()
        );
        assert_eq!(
            " 9000 ".parse::<PortRange>().unwrap(),
            PortRange::single(9000).unwrap()
        );
        assert!("abc".parse::<PortRange>().is_err());
        assert!("9000-8000".parse::<PortRange>().is_err());
        assert_eq!(PortRange::new(1, 2).unwrap().to_string(), "1-2");
    }

    #[test]
    fn test_range_serde_as_pair() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            range: PortRange,
        }

        let toml_str = "range = [8080, 8090]\n";
        let parsed: Wrapper = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.range, PortRange::new(8080, 8090).unwrap());

        let bad: std::result::Result<Wrapper, _> = toml::from_str("range = [10, 5]\n");
        assert!(bad.is_err());
    }

    #[test]
    fn test_find_returns_interior_free_port() {
        let probe = FakeProbe::with_free(&[8085]);
        let range = PortRange::new(8080, 8090).unwrap();

        let port = PortNegotiator::new(&probe).find(range).unwrap();

        assert_eq!(port, 8085);
        assert_eq!(*probe.probed.borrow(), vec![8080, 8081, 8082, 8083, 8084, 8085]);
    }

    #[test]
    fn test_find_prefers_lowest_free_port() {
        let probe = FakeProbe::with_free(&[8088, 8083, 8086]);
        let range = PortRange::new(8080, 8090).unwrap();

        assert_eq!(PortNegotiator::new(&probe).find(range).unwrap(), 8083);
    }

    #[test]
    fn test_find_exhaustion_probes_every_port() {
        let probe = FakeProbe::with_free(&[]);
        let range = PortRange::new(8080, 8090).unwrap();

        let err = PortNegotiator::new(&probe).find(range).unwrap_err();

        assert!(matches!(
            err,
            Error::NoAvailablePorts {
                start: 8080,
                end: 8090
            }
        ));
        assert_eq!(probe.probed.borrow().len(), range.len());
    }

    #[test]
    fn test_socket_probe_detects_occupied_port() {
        let holder = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = holder.local_addr().unwrap().port();

        assert!(!SocketProbe.is_available(port));

        drop(holder);
        assert!(SocketProbe.is_available(port));
    }
}
