//! Socket-to-HTTP request bridge.
//!
//! Lets socket clients call the same routes as plain HTTP clients: wire
//! events become canonical requests, run through an in-process pipeline,
//! and the response goes back as the event's acknowledgement. Each socket
//! gets its own cookie jar and sticky headers.

pub mod config;
pub mod cookies;
pub mod http;
pub mod manager;
pub mod observability;
pub mod pipeline;
pub mod protocol;
pub mod transport;

pub use config::BridgeConfig;
pub use http::BridgeServer;
pub use manager::{ConnectionManager, Registry};
pub use pipeline::Pipeline;
