//! Boundary with the socket transport.
//!
//! # Responsibilities
//! - Describe the handshake snapshot a connection was opened with
//! - Carry named wire events and their optional acknowledgement
//! - Let handlers subscribe to the event names they understand
//!
//! # Design Decisions
//! - The transport pushes events into `ConnectionManager::handle_event` and
//!   reports disconnects through `ConnectionManager::disconnect`; there is no
//!   ambient event bus
//! - Acknowledgements are single-shot closures

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::protocol::Headers;

/// Single-shot acknowledgement supplied by the client with an event.
pub type Ack = Box<dyn FnOnce(Value) + Send>;

/// Snapshot of the connection handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    /// Headers of the upgrade request.
    pub headers: Headers,
    /// Query parameters of the upgrade request.
    pub query: BTreeMap<String, String>,
}

/// A named event received from the client.
pub struct WireEvent {
    pub name: String,
    pub data: Value,
    pub ack: Option<Ack>,
}

impl WireEvent {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
            ack: None,
        }
    }

    /// Attach an acknowledgement callback.
    pub fn with_ack(mut self, ack: impl FnOnce(Value) + Send + 'static) -> Self {
        self.ack = Some(Box::new(ack));
        self
    }
}

impl fmt::Debug for WireEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireEvent")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("ack", &self.ack.is_some())
            .finish()
    }
}

/// A physical socket connection as seen by the bridge.
pub trait Connection: Send + Sync {
    /// Handshake the connection was opened with.
    fn handshake(&self) -> &Handshake;

    /// Send a named event to the client.
    fn emit(&self, event: &str, data: Value);

    /// Start delivering the given event names.
    fn subscribe(&self, events: &[&'static str]);

    /// Stop delivering every event.
    fn unsubscribe_all(&self);
}
