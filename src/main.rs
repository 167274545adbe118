//! Socket bridge server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Socket client                      HTTP client
//!          │                                  │
//!          ▼                                  │
//!   ┌──────────────┐                          │
//!   │  websocket   │  frames ↔ wire events    │
//!   └──────┬───────┘                          │
//!          ▼                                  │
//!   ┌──────────────┐  tag, cookies, sticky    │
//!   │   manager    │  headers, strip          │
//!   └──────┬───────┘                          │
//!          ▼                                  ▼
//!   ┌──────────────┐                 ┌──────────────┐
//!   │   pipeline   │ ──── oneshot ──▶│  app routes  │
//!   └──────────────┘                 └──────────────┘
//! ```
//!
//! The binary serves a small demo application so the bridge can be poked
//! at with any Sails-style socket client.

use std::path::PathBuf;

use axum::{
    body::Body,
    http::{header, HeaderMap, Request},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use socket_bridge::config::{load_config, BridgeConfig, SocketErrorsConfig};
use socket_bridge::http::middleware::{enforce_socket_access, SocketAccessState, SocketOrigin};
use socket_bridge::observability::{logging::init_logging, metrics::init_metrics};
use socket_bridge::BridgeServer;

#[derive(Parser)]
#[command(name = "socket-bridge", version, about = "Serve HTTP routes to socket clients")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };

    init_logging(&config.observability)?;

    tracing::info!("socket-bridge v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        socket_path = %config.listener.socket_path,
        cookies = config.bridge.cookies,
        sticky = ?config.bridge.sticky,
        strip = ?config.bridge.strip,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let app = demo_app(&config.errors);
    let server = BridgeServer::new(config, app);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_app(errors: &SocketErrorsConfig) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/session", get(session))
        .route("/echo", post(echo))
        .route("/whoami", get(whoami))
        .route(
            "/socket-only",
            get(|| async { "socket" }).route_layer(middleware::from_fn_with_state(
                SocketAccessState::required(errors),
                enforce_socket_access,
            )),
        )
        .route(
            "/http-only",
            get(|| async { "http" }).route_layer(middleware::from_fn_with_state(
                SocketAccessState::disabled(errors),
                enforce_socket_access,
            )),
        )
}

/// Count visits in a cookie.
async fn session(headers: HeaderMap) -> impl IntoResponse {
    let visits = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .filter_map(|pair| pair.trim().split_once('='))
                .find(|(name, _)| *name == "visits")
                .and_then(|(_, value)| value.parse::<u64>().ok())
        })
        .unwrap_or(0)
        + 1;

    (
        AppendHeaders([(header::SET_COOKIE, format!("visits={visits}; Path=/"))]),
        Json(json!({ "visits": visits })),
    )
}

async fn echo(headers: HeaderMap, Json(payload): Json<Value>) -> Json<Value> {
    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();
    Json(json!({ "headers": headers, "payload": payload }))
}

/// Report the caller's origin; socket callers also get a pushed event.
async fn whoami(req: Request<Body>) -> Json<Value> {
    match req.extensions().get::<SocketOrigin>() {
        Some(origin) => {
            origin
                .connection
                .emit("hello", json!({ "connection": origin.connection_id.as_str() }));
            Json(json!({ "socket": true, "connection": origin.connection_id.as_str() }))
        }
        None => Json(json!({ "socket": false })),
    }
}
