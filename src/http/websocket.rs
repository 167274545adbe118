//! WebSocket transport for the bridge.
//!
//! # Responsibilities
//! - Complete the upgrade and snapshot the handshake
//! - Decode JSON text frames into wire events
//! - Route acknowledgements and emitted events back to the client
//! - Report the disconnect to the connection manager
//!
//! # Frames
//! ```text
//! client → server   {"event": "get", "data": {...}, "ack": 7}
//! server → client   {"ack": 7, "data": {...}}
//! server → client   {"event": "warn", "data": {...}}
//! ```
//!
//! # Design Decisions
//! - A single writer task owns the socket sink; everything else queues frames
//! - Binary frames are ignored; ping/pong is left to axum
//! - Only events a handler subscribed to reach the manager

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, Uri},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::BridgeSettings;
use crate::manager::{ConnectionManager, Registry};
use crate::pipeline::Pipeline;
use crate::protocol::Headers;
use crate::transport::{Connection, Handshake, WireEvent};

/// Everything a socket needs to get a manager going.
#[derive(Clone)]
pub struct SocketState {
    pub pipeline: Arc<dyn Pipeline>,
    pub settings: Arc<BridgeSettings>,
    pub registry: Registry,
}

/// Frame sent by the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub ack: Option<u64>,
}

/// Frame sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Ack { ack: u64, data: Value },
    Event { event: String, data: Value },
}

pub fn decode_frame(text: &str) -> Result<InboundFrame, serde_json::Error> {
    serde_json::from_str(text)
}

fn send_frame(outbound: &mpsc::UnboundedSender<Message>, frame: &OutboundFrame) {
    match serde_json::to_string(frame) {
        Ok(text) => {
            if outbound.send(Message::Text(text.into())).is_err() {
                tracing::trace!("Socket writer gone, dropping frame");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to encode outbound frame"),
    }
}

/// Build the handshake snapshot from the upgrade request.
pub fn handshake_from_parts(headers: &HeaderMap, query: Option<&str>) -> Handshake {
    let mut snapshot = Headers::new();
    for name in headers.keys() {
        let separator = if *name == header::COOKIE { "; " } else { ", " };
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(separator);
        snapshot.insert(name.as_str().to_string(), joined);
    }

    let query: BTreeMap<String, String> = query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    Handshake {
        headers: snapshot,
        query,
    }
}

/// A live WebSocket as seen by the bridge.
pub struct WsConnection {
    handshake: Handshake,
    outbound: mpsc::UnboundedSender<Message>,
    subscriptions: Mutex<HashSet<&'static str>>,
}

impl WsConnection {
    pub fn new(handshake: Handshake, outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            handshake,
            outbound,
            subscriptions: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_subscribed(&self, event: &str) -> bool {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(event)
    }

    /// Hand a decoded frame to the manager if a handler listens for it.
    pub fn deliver(&self, manager: &ConnectionManager, frame: InboundFrame) {
        if !self.is_subscribed(&frame.event) {
            tracing::debug!(event = %frame.event, "No listener for event");
            return;
        }

        let mut event = WireEvent::new(frame.event, frame.data);
        if let Some(ack) = frame.ack {
            let outbound = self.outbound.clone();
            event = event.with_ack(move |data| {
                send_frame(&outbound, &OutboundFrame::Ack { ack, data });
            });
        }
        manager.handle_event(event);
    }
}

impl Connection for WsConnection {
    fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    fn emit(&self, event: &str, data: Value) {
        send_frame(
            &self.outbound,
            &OutboundFrame::Event {
                event: event.to_string(),
                data,
            },
        );
    }

    fn subscribe(&self, events: &[&'static str]) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(events.iter().copied());
    }

    fn unsubscribe_all(&self) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Axum handler for the socket route.
pub async fn upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<SocketState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let handshake = handshake_from_parts(&headers, uri.query());
    ws.on_upgrade(move |socket| serve_socket(socket, handshake, state))
}

/// Run one socket until the client goes away.
pub async fn serve_socket(socket: WebSocket, handshake: Handshake, state: SocketState) {
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection = Arc::new(WsConnection::new(handshake, outbound));
    let manager = ConnectionManager::new(
        Arc::clone(&state.pipeline),
        connection.clone(),
        Arc::clone(&state.settings),
    );
    manager.boot(&state.registry);

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match decode_frame(text.as_str()) {
                Ok(frame) => connection.deliver(&manager, frame),
                Err(e) => {
                    tracing::debug!(connection_id = %manager.id(), error = %e, "Ignoring malformed frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %manager.id(), error = %e, "Socket read failed");
                break;
            }
        }
    }

    manager.disconnect();
    writer.abort();
}
