//! Shared utilities for bridge integration tests.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use futures_util::StreamExt;
use serde_json::Value;
use socket_bridge::config::BridgeConfig;
use socket_bridge::manager::Registry;
use socket_bridge::transport::{Connection, Handshake};
use socket_bridge::BridgeServer;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection double that records emitted events.
#[derive(Default)]
pub struct MockConnection {
    pub handshake: Handshake,
    pub emitted: Mutex<Vec<(String, Value)>>,
}

#[allow(dead_code)]
impl MockConnection {
    pub fn new(handshake: Handshake) -> Arc<Self> {
        Arc::new(Self {
            handshake,
            emitted: Mutex::new(Vec::new()),
        })
    }

    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.emitted.lock().unwrap().clone()
    }
}

impl Connection for MockConnection {
    fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    fn emit(&self, event: &str, data: Value) {
        self.emitted.lock().unwrap().push((event.to_string(), data));
    }

    fn subscribe(&self, _events: &[&'static str]) {}

    fn unsubscribe_all(&self) {}
}

/// Handshake of a Sails.io.js client sending `headers`.
#[allow(dead_code)]
pub fn sails_handshake(headers: &[(&str, &str)]) -> Handshake {
    Handshake {
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        query: BTreeMap::from([("__sails_io_sdk_version".to_string(), "0.11.0".to_string())]),
    }
}

/// An acknowledgement closure and the channel its value lands in.
#[allow(dead_code)]
pub fn ack_channel() -> (impl FnOnce(Value) + Send + 'static, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |value| {
            let _ = tx.send(value);
        },
        rx,
    )
}

#[allow(dead_code)]
pub async fn recv_ack(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("ack timed out")
        .expect("ack channel closed")
}

/// Start a bridge server on an ephemeral port.
#[allow(dead_code)]
pub async fn start_bridge(config: BridgeConfig, app: Router) -> (SocketAddr, Registry) {
    let server = BridgeServer::new(config, app);
    let registry = server.registry().clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_until(listener, std::future::pending()).await;
    });

    (addr, registry)
}

/// Next JSON text frame from the server.
#[allow(dead_code)]
pub async fn next_json(ws: &mut ClientSocket) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("frame timed out")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Poll `check` until it holds or a second has passed.
#[allow(dead_code)]
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
