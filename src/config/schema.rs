//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Listener configuration (bind address, socket route).
    pub listener: ListenerConfig,

    /// Per-connection cookie and header policy.
    pub bridge: BridgeSettings,

    /// In-process pipeline limits.
    pub pipeline: PipelineConfig,

    /// Error messages for route access rules.
    pub errors: SocketErrorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:1337").
    pub bind_address: String,

    /// Route the WebSocket upgrade is served on.
    pub socket_path: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:1337".to_string(),
            socket_path: "/socket".to_string(),
        }
    }
}

/// Cookie and header policy applied by every connection manager.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Track cookies across requests on one connection.
    pub cookies: bool,

    /// Handshake headers copied onto every request.
    pub sticky: Vec<String>,

    /// Headers removed from every response before the reply.
    pub strip: Vec<String>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            cookies: true,
            sticky: Vec::new(),
            strip: Vec::new(),
        }
    }
}

impl BridgeSettings {
    /// Lower-case the configured header names.
    pub fn normalized(mut self) -> Self {
        for name in self.sticky.iter_mut().chain(self.strip.iter_mut()) {
            *name = name.trim().to_ascii_lowercase();
        }
        self
    }
}

/// Limits for injecting into the request pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Largest response body collected from the pipeline.
    pub max_body_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Replies for routes that restrict socket access.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketErrorsConfig {
    /// Message when a socket calls a route with sockets disabled.
    pub disabled: String,

    /// Message when plain HTTP calls a socket-only route.
    pub required: String,
}

impl Default for SocketErrorsConfig {
    fn default() -> Self {
        Self {
            disabled: "Websockets are not allowed on this route.".to_string(),
            required: "This route may only be accessed via websockets.".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
