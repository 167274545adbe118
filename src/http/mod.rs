//! HTTP and WebSocket surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, socket route + application routes)
//!     → websocket.rs (upgrade, frames ↔ wire events, ConnectionManager)
//!     → ConnectionManager → RouterPipeline → application routes
//!     → middleware/ (socket origin, per-route socket access)
//! ```

pub mod middleware;
pub mod server;
pub mod websocket;

pub use middleware::{SocketAccess, SocketAccessState, SocketOrigin};
pub use server::BridgeServer;
pub use websocket::{SocketState, WsConnection};
