//! Session cookie storage for a single socket connection.
//!
//! # Data Flow
//! ```text
//! handshake `cookie` header ──┐
//! request `cookie` header  ───┼──→ CookieJar (name → Cookie)
//! response `set-cookie`    ───┘         │
//!                                       └──→ `cookie` header on every injected request
//! ```
//!
//! # Design Decisions
//! - Domain/path agnostic: one socket talks to one origin
//! - Malformed cookie strings are skipped, never fatal
//! - Insertion order is kept so the serialized header is stable

pub mod cookie;
pub mod jar;

pub use cookie::{Cookie, CookieParseError};
pub use jar::{CookieJar, CookieSource};
