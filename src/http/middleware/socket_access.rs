//! Socket origin tagging and per-route access rules.
//!
//! Requests injected by a connection manager carry the connection header.
//! `attach_socket_origin` resolves it through the registry and stores a
//! [`SocketOrigin`] in the request extensions, so handlers can reach the
//! originating socket. `enforce_socket_access` rejects requests from the
//! wrong side of a route's access rule.

use std::fmt;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::SocketErrorsConfig;
use crate::manager::{ConnectionId, Registry, CONNECTION_HEADER};
use crate::transport::Connection;

/// The socket a request was injected from.
#[derive(Clone)]
pub struct SocketOrigin {
    pub connection_id: ConnectionId,
    pub connection: Arc<dyn Connection>,
}

impl fmt::Debug for SocketOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketOrigin")
            .field("connection_id", &self.connection_id)
            .finish_non_exhaustive()
    }
}

pub async fn attach_socket_origin(
    State(registry): State<Registry>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let manager = req
        .headers()
        .get(CONNECTION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|id| registry.get(id));

    if let Some(manager) = manager {
        req.extensions_mut().insert(SocketOrigin {
            connection_id: manager.id().clone(),
            connection: Arc::clone(manager.connection()),
        });
    }

    next.run(req).await
}

/// Which side of the bridge a route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketAccess {
    /// Plain HTTP only.
    Disabled,
    /// Socket-injected requests only.
    Required,
}

#[derive(Debug, Clone)]
pub struct SocketAccessState {
    pub access: SocketAccess,
    pub message: String,
}

impl SocketAccessState {
    pub fn disabled(errors: &SocketErrorsConfig) -> Self {
        Self {
            access: SocketAccess::Disabled,
            message: errors.disabled.clone(),
        }
    }

    pub fn required(errors: &SocketErrorsConfig) -> Self {
        Self {
            access: SocketAccess::Required,
            message: errors.required.clone(),
        }
    }
}

/// Route layer applying a [`SocketAccessState`].
///
/// Must run inside `attach_socket_origin`.
pub async fn enforce_socket_access(
    State(state): State<SocketAccessState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let from_socket = req.extensions().get::<SocketOrigin>().is_some();

    match (state.access, from_socket) {
        (SocketAccess::Disabled, true) | (SocketAccess::Required, false) => {
            tracing::debug!(
                path = %req.uri().path(),
                from_socket,
                "Route access rule rejected request"
            );
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "statusCode": 400,
                    "error": "Bad Request",
                    "message": state.message,
                })),
            )
                .into_response()
        }
        _ => next.run(req).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeSettings;
    use crate::manager::ConnectionManager;
    use crate::pipeline::pipeline_fn;
    use crate::protocol::Response as BridgeResponse;
    use crate::transport::testing::RecordingConnection;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(
            Arc::new(pipeline_fn(|_| async { BridgeResponse::new(200, "") })),
            Arc::new(RecordingConnection::default()),
            Arc::new(BridgeSettings::default()),
        )
    }

    fn app(registry: Registry) -> Router {
        let errors = SocketErrorsConfig::default();
        Router::new()
            .route(
                "/whoami",
                get(|req: Request<Body>| async move {
                    req.extensions()
                        .get::<SocketOrigin>()
                        .map(|o| o.connection_id.to_string())
                        .unwrap_or_else(|| "http".to_string())
                }),
            )
            .route(
                "/socket-only",
                get(|| async { "ok" }).route_layer(middleware::from_fn_with_state(
                    SocketAccessState::required(&errors),
                    enforce_socket_access,
                )),
            )
            .route(
                "/http-only",
                get(|| async { "ok" }).route_layer(middleware::from_fn_with_state(
                    SocketAccessState::disabled(&errors),
                    enforce_socket_access,
                )),
            )
            .layer(middleware::from_fn_with_state(registry, attach_socket_origin))
    }

    async fn call(app: Router, path: &str, connection: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri(path);
        if let Some(id) = connection {
            builder = builder.header(CONNECTION_HEADER, id);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_resolves_registered_connection() {
        let registry = Registry::new();
        let manager = manager();
        registry.insert(manager.clone());

        let (status, body) = call(app(registry), "/whoami", Some(manager.id().as_str())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, manager.id().to_string());
    }

    #[tokio::test]
    async fn test_unknown_connection_is_plain_http() {
        let (_, body) = call(app(Registry::new()), "/whoami", Some("deadbeef")).await;
        assert_eq!(body, "http");
    }

    #[tokio::test]
    async fn test_socket_only_route_rejects_http() {
        let (status, body) = call(app(Registry::new()), "/socket-only", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["message"], "This route may only be accessed via websockets.");
    }

    #[tokio::test]
    async fn test_http_only_route_rejects_sockets() {
        let registry = Registry::new();
        let manager = manager();
        registry.insert(manager.clone());
        let app = app(registry);

        let (status, body) = call(app.clone(), "/http-only", Some(manager.id().as_str())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Websockets are not allowed on this route."));

        let (status, _) = call(app, "/http-only", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
