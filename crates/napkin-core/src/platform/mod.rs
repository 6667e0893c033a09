//! Capability detection for the host platform.
//!
//! The upload server needs two things from the operating system: the
//! ability to bind raw TCP listening sockets, and the ability to enumerate
//! network interfaces. Sandboxed runtimes (WebAssembly hosts, for example)
//! provide neither. Each capability is checked up front so `start()` can
//! refuse cleanly instead of failing halfway through.

use crate::error::{Error, Result};

/// The operating-system capabilities the upload server depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// TCP listening sockets can be bound
    pub sockets: bool,
    /// Network interfaces can be enumerated
    pub interfaces: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

impl Capabilities {
    /// Detect the capabilities of the current build target.
    #[must_use]
    pub const fn detect() -> Self {
        let sandboxed = cfg!(target_family = "wasm");
        Self {
            sockets: !sandboxed,
            interfaces: !sandboxed,
        }
    }

    /// Every capability available.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            sockets: true,
            interfaces: true,
        }
    }

    /// No capability available, as in a sandboxed runtime.
    #[must_use]
    pub const fn sandboxed() -> Self {
        Self {
            sockets: false,
            interfaces: false,
        }
    }

    /// Fail with [`Error::Unsupported`] unless sockets can be bound.
    pub fn require_sockets(&self) -> Result<()> {
        if self.sockets {
            Ok(())
        } else {
            Err(Error::Unsupported(
                "raw TCP sockets are not available in this environment".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_on_native_target() {
        let caps = Capabilities::detect();
        assert!(caps.sockets);
        assert!(caps.interfaces);
        assert!(caps.require_sockets().is_ok());
    }

    #[test]
    fn test_sandboxed_refuses_sockets() {
        let err = Capabilities::sandboxed().require_sockets().unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
