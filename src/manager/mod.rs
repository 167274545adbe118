//! Connection management subsystem.
//!
//! # Data Flow
//! ```text
//! transport accepts socket
//!     → ConnectionManager::new (detect protocol, identity, seed jar)
//!     → boot (Registry insert, handler listening, pump task)
//!     → per request: tag → sync cookies → sticky headers → Pipeline::inject
//!     → per response: set-cookie → jar, strip headers → reply
//! transport reports disconnect
//!     → disconnect (handler closed, jar dropped, Registry remove)
//! ```

pub mod connection;
pub mod identity;
pub mod registry;

pub use connection::{ConnectionManager, CONNECTION_HEADER, UNKNOWN_PROTOCOL_WARNING};
pub use identity::ConnectionId;
pub use registry::Registry;
