//! Session token generation.
//!
//! A token is the only credential guarding an upload session. It is minted
//! once per `start()` from the operating system's CSPRNG, handed to the
//! phone out-of-band (QR code or URL) and compared in constant time on every
//! request.

use std::fmt::Write;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::TOKEN_BYTES;

/// Generate a fresh session token.
///
/// Returns [`TOKEN_BYTES`] bytes of OS randomness as lowercase hex
/// (32 characters).
#[must_use]
pub fn generate_token() -> String {
    let bytes = random_bytes::<TOKEN_BYTES>();
    bytes
        .iter()
        .fold(String::with_capacity(TOKEN_BYTES * 2), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

/// Generate cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Constant-time comparison of two byte slices.
///
/// Returns `true` if the slices are equal, `false` otherwise. The running
/// time depends only on the length of the inputs, not on where the first
/// difference occurs.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
