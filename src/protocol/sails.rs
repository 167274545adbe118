//! Sails.io 0.11 socket dialect.
//!
//! Clients emit one event per HTTP method (`get`, `post`, ...) carrying
//! `{method, url, headers, data}` and expect an acknowledgement shaped as
//! `{body, headers, statusCode}`.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::protocol::handler::{
    DeferredReply, Dispatcher, DraftRequest, Handler, HandlerState, Reply, RequestSink,
    INTERNAL_FIELDS,
};
use crate::protocol::types::Response;
use crate::transport::{Ack, Connection, WireEvent};

/// Event names Sails.io.js sends.
pub const SAILS_EVENTS: [&str; 7] = ["get", "post", "put", "delete", "patch", "options", "head"];

/// Handler for the Sails socket protocol.
pub struct SailsHandler {
    connection: Arc<dyn Connection>,
    dispatcher: Dispatcher,
}

impl SailsHandler {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            dispatcher: Dispatcher::new(),
        }
    }

    fn draft(data: Value) -> DraftRequest {
        let mut fields = match data {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };

        let method = fields
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_uppercase();
        let url = fields.remove("url").unwrap_or(Value::Null);
        let headers = match fields.remove("headers") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(headers) => headers,
        };
        let payload = match fields.remove("data") {
            None | Some(Value::Null) => None,
            Some(data) => Some(data),
        };
        let internal = INTERNAL_FIELDS
            .iter()
            .filter_map(|name| fields.remove(*name).map(|v| (name.to_string(), v)))
            .collect();

        DraftRequest {
            method,
            url,
            headers,
            payload,
            internal,
        }
    }
}

/// Build the reply that answers through the client's acknowledgement.
///
/// The body is decoded as JSON when possible and passed as a string otherwise.
pub fn respond(ack: Option<Ack>) -> Reply {
    Box::new(move |response: Response| {
        let Some(ack) = ack else {
            return;
        };

        let raw = String::from_utf8_lossy(&response.raw_body).into_owned();
        let body = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));

        ack(json!({
            "body": body,
            "headers": response.headers,
            "statusCode": response.status_code,
        }));
    })
}

impl Handler for SailsHandler {
    fn protocol(&self) -> &'static str {
        "sails"
    }

    fn events(&self) -> &'static [&'static str] {
        &SAILS_EVENTS
    }

    fn state(&self) -> HandlerState {
        self.dispatcher.state()
    }

    fn boot(&mut self, sink: RequestSink) {
        self.dispatcher.open(sink);
        self.connection.subscribe(&SAILS_EVENTS);
    }

    fn close(&mut self) {
        self.dispatcher.close();
        self.connection.unsubscribe_all();
    }

    fn on_event(&self, event: WireEvent) -> Option<DeferredReply> {
        if !SAILS_EVENTS.contains(&event.name.as_str()) {
            tracing::debug!(event = %event.name, "Ignoring unknown Sails event");
            return None;
        }

        let reply = respond(event.ack);
        match self.dispatcher.dispatch(Self::draft(event.data), reply) {
            Ok(()) => None,
            Err(rejection) => {
                let reason = rejection.reason.to_string();
                tracing::debug!(reason = %reason, "Rejected socket request");
                crate::observability::metrics::record_rejected(&reason);
                Some(DeferredReply::new(
                    rejection.reply,
                    Response::bad_request(&reason),
                ))
            }
        }
    }
}
