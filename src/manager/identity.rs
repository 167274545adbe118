//! Connection identity.
//!
//! Identities travel in request headers and are used to find the originating
//! socket from inside the pipeline, so they must be unguessable: 32 bytes from
//! the operating system's CSPRNG, hex encoded.

use std::borrow::Borrow;
use std::fmt;
use std::fmt::Write as _;

use rand::rngs::OsRng;
use rand::RngCore;

const ID_BYTES: usize = 32;

/// Unique, unguessable identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        let mut bytes = [0u8; ID_BYTES];
        OsRng.fill_bytes(&mut bytes);

        let mut hex = String::with_capacity(ID_BYTES * 2);
        for byte in bytes {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ConnectionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
