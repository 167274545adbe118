//! Protocol handler abstraction and the shared dispatch logic.
//!
//! # Responsibilities
//! - Define the `Handler` trait every wire dialect implements
//! - Track the `Unopened → Open → Closed` lifecycle
//! - Validate draft requests and emit them to the manager
//!
//! # Design Decisions
//! - Requests reach the manager through an mpsc channel handed over at boot
//! - Closing drops the channel sender, so nothing is emitted afterwards
//! - Rejected drafts hand their reply back to the caller, which owns the
//!   wire-specific error reply

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::types::{Headers, Method, Request, Response};
use crate::transport::WireEvent;

/// Event fields that only the trusted pipeline may set.
pub const INTERNAL_FIELDS: [&str; 2] = ["credentials", "simulate"];

/// Single-shot continuation that delivers a response to the client.
pub type Reply = Box<dyn FnOnce(Response) + Send>;

/// Channel end the handler emits validated requests into.
pub type RequestSink = mpsc::UnboundedSender<PendingRequest>;

/// A validated request together with the way back to the client.
pub struct PendingRequest {
    pub request: Request,
    pub reply: Reply,
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// A reply held back until the caller has released its locks.
#[must_use = "the reply is only delivered by `send`"]
pub struct DeferredReply {
    reply: Reply,
    response: Response,
}

impl DeferredReply {
    pub fn new(reply: Reply, response: Response) -> Self {
        Self { reply, response }
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Hand the response to the client.
    pub fn send(self) {
        (self.reply)(self.response)
    }
}

impl fmt::Debug for DeferredReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredReply")
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// Reasons a draft request is refused before reaching the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid method.")]
    InvalidMethod,

    #[error("Invalid URL.")]
    InvalidUrl,

    #[error("Invalid headers.")]
    InvalidHeaders,

    /// The event tried to set fields reserved for the pipeline.
    #[error("Invalid request.")]
    InvalidRequest,
}

/// A request as assembled from a wire event, not yet validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftRequest {
    pub method: String,
    pub url: Value,
    pub headers: Value,
    pub payload: Option<Value>,
    /// Any of [`INTERNAL_FIELDS`] found on the event.
    pub internal: Map<String, Value>,
}

impl DraftRequest {
    /// Check the draft and turn it into a canonical request.
    pub fn validate(self) -> Result<Request, ValidationError> {
        let method: Method = self
            .method
            .parse()
            .map_err(|_| ValidationError::InvalidMethod)?;

        let url = match self.url {
            Value::String(url) => url,
            _ => return Err(ValidationError::InvalidUrl),
        };

        let raw_headers = match self.headers {
            Value::Object(map) => map,
            _ => return Err(ValidationError::InvalidHeaders),
        };
        let mut headers = Headers::new();
        for (name, value) in raw_headers {
            match value {
                Value::String(value) => {
                    headers.insert(name, value);
                }
                _ => return Err(ValidationError::InvalidHeaders),
            }
        }

        if self.internal.values().any(is_truthy) {
            return Err(ValidationError::InvalidRequest);
        }

        Ok(Request {
            method,
            url,
            headers,
            payload: self.payload,
        })
    }
}

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// A draft that failed validation, with its unused reply.
pub struct Rejection {
    pub reason: ValidationError,
    pub reply: Reply,
}

impl fmt::Debug for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejection")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Handler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Unopened,
    Open,
    Closed,
}

/// A wire dialect: turns events into requests and responses into replies.
pub trait Handler: Send {
    /// Short protocol name for logs.
    fn protocol(&self) -> &'static str;

    /// Event names this handler listens to.
    fn events(&self) -> &'static [&'static str];

    fn state(&self) -> HandlerState;

    /// Start listening; validated requests are emitted into `sink`.
    fn boot(&mut self, sink: RequestSink);

    /// Stop listening. Terminal.
    fn close(&mut self);

    /// Handle one event the transport delivered.
    ///
    /// An event answered without reaching the pipeline returns its reply
    /// instead of sending it, so the caller can send it lock-free.
    fn on_event(&self, event: WireEvent) -> Option<DeferredReply>;
}

/// Lifecycle and emission logic shared by every handler.
#[derive(Debug)]
pub struct Dispatcher {
    state: HandlerState,
    sink: Option<RequestSink>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            state: HandlerState::Unopened,
            sink: None,
        }
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Unopened → Open.
    pub fn open(&mut self, sink: RequestSink) {
        if self.state == HandlerState::Closed {
            return;
        }
        self.state = HandlerState::Open;
        self.sink = Some(sink);
    }

    /// Any state → Closed; drops the sink.
    pub fn close(&mut self) {
        self.state = HandlerState::Closed;
        self.sink = None;
    }

    /// Validate `draft` and emit it.
    ///
    /// Valid drafts are emitted exactly once while open and silently dropped
    /// otherwise. Invalid drafts come back as a [`Rejection`].
    pub fn dispatch(&self, draft: DraftRequest, reply: Reply) -> Result<(), Rejection> {
        let request = match draft.validate() {
            Ok(request) => request,
            Err(reason) => return Err(Rejection { reason, reply }),
        };

        match &self.sink {
            Some(sink) => {
                if sink.send(PendingRequest { request, reply }).is_err() {
                    tracing::debug!("Request receiver gone, dropping request");
                }
            }
            None => {
                tracing::debug!(state = ?self.state, "Handler not open, dropping request");
            }
        }
        Ok(())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(method: &str, url: Value, headers: Value) -> DraftRequest {
        DraftRequest {
            method: method.to_string(),
            url,
            headers,
            payload: Some(json!({"b": "c"})),
            internal: Map::new(),
        }
    }

    fn noop_reply() -> Reply {
        Box::new(|_| {})
    }

    fn reason(result: Result<(), Rejection>) -> ValidationError {
        result.expect_err("draft should be rejected").reason
    }

    #[test]
    fn test_emits_valid_request_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new();
        dispatcher.open(tx);

        let result = dispatcher.dispatch(
            draft("get", json!("/api/v1/users/current?"), json!({"a": "b"})),
            noop_reply(),
        );
        assert!(result.is_ok());

        let pending = rx.try_recv().unwrap();
        assert_eq!(pending.request.method, Method::Get);
        assert_eq!(pending.request.url, "/api/v1/users/current?");
        assert_eq!(pending.request.headers.get("a").map(String::as_str), Some("b"));
        assert_eq!(pending.request.payload, Some(json!({"b": "c"})));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rejects_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new();
        dispatcher.open(tx);

        let cases = [
            (draft("blip", json!("/"), json!({})), ValidationError::InvalidMethod),
            (draft("blip", json!(1), json!(1)), ValidationError::InvalidMethod),
            (draft("GET", Value::Null, json!({})), ValidationError::InvalidUrl),
            (draft("GET", json!(42), json!({})), ValidationError::InvalidUrl),
            (draft("GET", json!("/"), json!("a: b")), ValidationError::InvalidHeaders),
            (draft("GET", json!("/"), json!(["a"])), ValidationError::InvalidHeaders),
            (draft("GET", json!("/"), json!({"1": 2})), ValidationError::InvalidHeaders),
            (draft("GET", json!("/"), json!({"a": {"b": "c"}})), ValidationError::InvalidHeaders),
        ];

        for (draft, expected) in cases {
            assert_eq!(reason(dispatcher.dispatch(draft, noop_reply())), expected);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rejects_internal_fields() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new();
        dispatcher.open(tx);

        let mut forged = draft("GET", json!("/"), json!({}));
        forged.internal.insert("credentials".into(), json!({}));
        assert_eq!(
            reason(dispatcher.dispatch(forged, noop_reply())),
            ValidationError::InvalidRequest
        );

        let mut simulated = draft("GET", json!("/"), json!({}));
        simulated.internal.insert("simulate".into(), json!(true));
        assert_eq!(
            reason(dispatcher.dispatch(simulated, noop_reply())),
            ValidationError::InvalidRequest
        );

        let mut harmless = draft("GET", json!("/"), json!({}));
        harmless.internal.insert("simulate".into(), json!(false));
        assert!(dispatcher.dispatch(harmless, noop_reply()).is_ok());

        assert_eq!(rx.try_recv().map(|p| p.request.url).ok().as_deref(), Some("/"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_reasons_are_human_readable() {
        assert_eq!(ValidationError::InvalidMethod.to_string(), "Invalid method.");
        assert_eq!(ValidationError::InvalidUrl.to_string(), "Invalid URL.");
        assert_eq!(ValidationError::InvalidHeaders.to_string(), "Invalid headers.");
        assert_eq!(ValidationError::InvalidRequest.to_string(), "Invalid request.");
    }

    #[test]
    fn test_closed_dispatcher_emits_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.state(), HandlerState::Unopened);
        dispatcher.open(tx);
        assert_eq!(dispatcher.state(), HandlerState::Open);
        dispatcher.close();
        assert_eq!(dispatcher.state(), HandlerState::Closed);

        let result = dispatcher.dispatch(draft("GET", json!("/"), json!({})), noop_reply());
        assert!(result.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_is_terminal() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new();
        dispatcher.close();
        dispatcher.open(tx);
        assert_eq!(dispatcher.state(), HandlerState::Closed);
    }
}
