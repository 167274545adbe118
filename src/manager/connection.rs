//! Per-connection orchestration.
//!
//! # Responsibilities
//! - Pick the protocol handler for the connection
//! - Keep the cookie jar and sticky headers for the socket's lifetime
//! - Ferry validated requests into the pipeline and responses back out
//! - Tear everything down on disconnect
//!
//! # Design Decisions
//! - One pump task per connection keeps pre-pipeline work in arrival order
//! - Each pipeline call runs in its own task; the call is the only await point
//! - Handler and jar live in one `Option` behind a mutex: `None` means torn
//!   down, and a response finishing after that is dropped
//! - Client replies are sent after the session lock is released, so an
//!   acknowledgement may call back into the manager

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::BridgeSettings;
use crate::cookies::CookieJar;
use crate::manager::identity::ConnectionId;
use crate::manager::registry::Registry;
use crate::observability::metrics;
use crate::pipeline::Pipeline;
use crate::protocol::detect::{detect_variant, WARN_EVENT};
use crate::protocol::{
    lower_keys, Handler, HandlerState, HeaderValues, Headers, Method, PendingRequest, Reply,
    Response, ResponseHeaders,
};
use crate::transport::{Connection, WireEvent};

/// Header that tags injected requests with the originating connection.
pub const CONNECTION_HEADER: &str = "x-bridge-connection";

/// Warning sent to clients whose handshake carried no protocol marker.
pub const UNKNOWN_PROTOCOL_WARNING: &str = "Unknown protocol; defaulting to Sails.";

/// State that exists only while the connection is live.
struct Session {
    handler: Box<dyn Handler>,
    jar: Option<CookieJar>,
}

struct Inner {
    id: ConnectionId,
    settings: Arc<BridgeSettings>,
    pipeline: Arc<dyn Pipeline>,
    connection: Arc<dyn Connection>,
    /// Handshake headers with lower-cased names.
    handshake_headers: Headers,
    session: Mutex<Option<Session>>,
    booted: AtomicBool,
    /// Set only once this manager holds its own registry entry.
    registry: OnceLock<Registry>,
}

/// Owns the handler and cookie jar of one socket connection.
///
/// Cheap to clone; clones share the same connection state.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Set up a manager for a freshly accepted connection.
    pub fn new(
        pipeline: Arc<dyn Pipeline>,
        connection: Arc<dyn Connection>,
        settings: Arc<BridgeSettings>,
    ) -> Self {
        let id = ConnectionId::generate();

        let detection = detect_variant(connection.handshake());
        if !detection.recognized {
            tracing::warn!(
                connection_id = %id,
                "No protocol marker in handshake, defaulting to Sails"
            );
            connection.emit(WARN_EVENT, json!({ "error": UNKNOWN_PROTOCOL_WARNING }));
        }
        let handler = detection.variant.handler(Arc::clone(&connection));

        let handshake_headers = lower_keys(connection.handshake().headers.clone());

        let jar = settings.cookies.then(|| {
            let mut jar = CookieJar::new();
            if let Some(cookie) = handshake_headers.get("cookie") {
                jar.set_cookies(cookie.as_str());
            }
            jar
        });

        Self {
            inner: Arc::new(Inner {
                id,
                settings,
                pipeline,
                connection,
                handshake_headers,
                session: Mutex::new(Some(Session { handler, jar })),
                booted: AtomicBool::new(false),
                registry: OnceLock::new(),
            }),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.inner.id
    }

    /// The physical connection this manager serves.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.inner.connection
    }

    pub fn handshake_headers(&self) -> &Headers {
        &self.inner.handshake_headers
    }

    /// Protocol of the active handler, `None` after teardown.
    pub fn protocol(&self) -> Option<&'static str> {
        self.session().as_ref().map(|s| s.handler.protocol())
    }

    /// True until [`disconnect`](Self::disconnect) has run.
    pub fn is_live(&self) -> bool {
        self.session().is_some()
    }

    /// Register in `registry` and start serving requests.
    ///
    /// Must be called from within a Tokio runtime, once.
    pub fn boot(&self, registry: &Registry) {
        if self.inner.booted.swap(true, Ordering::SeqCst) {
            tracing::warn!(connection_id = %self.inner.id, "Connection manager booted twice");
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut session = self.session();
            let Some(session) = session.as_mut() else {
                return;
            };
            if registry.insert(self.clone()) {
                let _ = self.inner.registry.set(registry.clone());
            } else {
                tracing::error!(
                    connection_id = %self.inner.id,
                    "Identity already registered, serving connection unregistered"
                );
            }
            session.handler.boot(tx);
            tracing::info!(
                connection_id = %self.inner.id,
                protocol = session.handler.protocol(),
                "Connection booted"
            );
        }

        metrics::record_connection_opened();
        tokio::spawn(self.clone().pump(rx));
    }

    /// Deliver a wire event from the transport.
    pub fn handle_event(&self, event: WireEvent) {
        let deferred = {
            let session = self.session();
            match session.as_ref() {
                Some(s) if s.handler.state() == HandlerState::Open => s.handler.on_event(event),
                _ => {
                    tracing::debug!(
                        connection_id = %self.inner.id,
                        event = %event.name,
                        "Dropping event for inactive connection"
                    );
                    None
                }
            }
        };

        if let Some(deferred) = deferred {
            deferred.send();
        }
    }

    /// Tear down after the transport reported a disconnect. Idempotent.
    pub fn disconnect(&self) {
        let mut session = self.session();
        let Some(mut live) = session.take() else {
            return;
        };

        let was_open = live.handler.state() == HandlerState::Open;
        live.handler.close();
        drop(live);
        if let Some(registry) = self.inner.registry.get() {
            registry.remove(&self.inner.id);
        }
        drop(session);

        if was_open {
            metrics::record_connection_closed();
        }
        tracing::info!(connection_id = %self.inner.id, "Connection closed");
    }

    /// Reconcile request cookies with the jar.
    ///
    /// A non-empty `cookie` header replaces the jar contents; the header is
    /// then set to everything the jar holds.
    pub fn sync_cookies(&self, headers: &mut Headers) {
        let mut session = self.session();
        if let Some(session) = session.as_mut() {
            self.sync_jar(session.jar.as_mut(), headers);
        }
    }

    /// Store cookies from a response's `set-cookie` header.
    pub fn update_cookies(&self, headers: &ResponseHeaders) {
        let mut session = self.session();
        if let Some(session) = session.as_mut() {
            self.absorb_set_cookie(session.jar.as_mut(), headers);
        }
    }

    /// Copy the configured handshake headers onto `headers`, overwriting.
    pub fn add_sticky_headers(&self, headers: &mut Headers) {
        for name in &self.inner.settings.sticky {
            let name = name.to_ascii_lowercase();
            match self.inner.handshake_headers.get(&name) {
                Some(value) => {
                    headers.insert(name, value.clone());
                }
                None => {
                    headers.remove(&name);
                }
            }
        }
    }

    /// Remove the configured headers from a response, ignoring case.
    pub fn strip_headers(&self, response: &mut Response) {
        let strip = &self.inner.settings.strip;
        response
            .headers
            .retain(|name, _| !strip.iter().any(|s| s.eq_ignore_ascii_case(name)));
    }

    async fn pump(self, mut rx: mpsc::UnboundedReceiver<PendingRequest>) {
        while let Some(pending) = rx.recv().await {
            self.process(pending);
        }
        tracing::trace!(connection_id = %self.inner.id, "Request pump stopped");
    }

    fn process(&self, pending: PendingRequest) {
        let PendingRequest { mut request, reply } = pending;

        {
            let mut session = self.session();
            let Some(session) = session.as_mut() else {
                tracing::debug!(connection_id = %self.inner.id, "Dropping request for closed connection");
                return;
            };

            request.headers = lower_keys(std::mem::take(&mut request.headers));
            request
                .headers
                .insert(CONNECTION_HEADER.to_string(), self.inner.id.to_string());
            self.sync_jar(session.jar.as_mut(), &mut request.headers);
            self.add_sticky_headers(&mut request.headers);
        }

        let span = tracing::debug_span!(
            "socket_request",
            connection_id = %self.inner.id,
            request_id = %Uuid::new_v4(),
            method = %request.method,
            url = %request.url,
        );
        let method = request.method;
        let started = Instant::now();
        let injected = self.inner.pipeline.inject(request);
        let manager = self.clone();

        tokio::spawn(
            async move {
                let response = injected.await;
                manager.complete(method, started, response, reply);
            }
            .instrument(span),
        );
    }

    fn complete(&self, method: Method, started: Instant, mut response: Response, reply: Reply) {
        response.headers = lower_keys(std::mem::take(&mut response.headers));
        {
            let mut session = self.session();
            let Some(session) = session.as_mut() else {
                tracing::debug!(status = response.status_code, "Connection gone, discarding response");
                metrics::record_discarded();
                return;
            };
            self.absorb_set_cookie(session.jar.as_mut(), &response.headers);
        }

        self.strip_headers(&mut response);

        tracing::debug!(status = response.status_code, "Replying to socket request");
        metrics::record_request(method.as_str(), response.status_code, started);
        reply(response);
    }

    fn sync_jar(&self, jar: Option<&mut CookieJar>, headers: &mut Headers) {
        if !self.inner.settings.cookies {
            return;
        }
        let Some(jar) = jar else {
            return;
        };

        if let Some(fresh) = headers.get("cookie").filter(|c| !c.is_empty()) {
            jar.clear();
            jar.set_cookies(fresh.as_str());
        }
        headers.insert("cookie".to_string(), jar.get_cookies());
    }

    fn absorb_set_cookie(&self, jar: Option<&mut CookieJar>, headers: &ResponseHeaders) {
        if !self.inner.settings.cookies {
            return;
        }
        let Some(jar) = jar else {
            return;
        };

        let set_cookie = headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"));
        for (_, values) in set_cookie {
            match values {
                HeaderValues::One(line) => jar.set_cookies(std::slice::from_ref(line)),
                HeaderValues::Many(lines) => jar.set_cookies(lines.as_slice()),
            };
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("id", &self.inner.id)
            .field("live", &self.is_live())
            .finish()
    }
}
