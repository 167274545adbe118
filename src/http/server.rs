//! HTTP server setup.
//!
//! # Responsibilities
//! - Mount the socket route next to the application's routes
//! - Build the in-process pipeline from the application router
//! - Wire up middleware (socket origin, tracing)
//! - Serve until a shutdown signal arrives

use std::future::Future;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::BridgeConfig;
use crate::http::middleware::attach_socket_origin;
use crate::http::websocket::{upgrade_handler, SocketState};
use crate::manager::Registry;
use crate::pipeline::{Pipeline, RouterPipeline};

/// Serves an application router over HTTP and over the socket bridge.
pub struct BridgeServer {
    router: Router,
    config: BridgeConfig,
    registry: Registry,
}

impl BridgeServer {
    /// Wrap `app`; socket requests are injected into the same routes.
    pub fn new(config: BridgeConfig, app: Router) -> Self {
        let registry = Registry::new();
        let app = app.layer(middleware::from_fn_with_state(
            registry.clone(),
            attach_socket_origin,
        ));

        let pipeline: Arc<dyn Pipeline> = Arc::new(RouterPipeline::new(
            app.clone(),
            config.pipeline.max_body_bytes,
        ));
        let state = SocketState {
            pipeline,
            settings: Arc::new(config.bridge.clone().normalized()),
            registry: registry.clone(),
        };

        let router = Self::build_router(&config, state, app);
        Self {
            router,
            config,
            registry,
        }
    }

    fn build_router(config: &BridgeConfig, state: SocketState, app: Router) -> Router {
        Router::new()
            .route(&config.listener.socket_path, get(upgrade_handler))
            .with_state(state)
            .merge(app)
            .layer(TraceLayer::new_for_http())
    }

    /// Live connections, keyed by connection id.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The complete router, for serving it some other way.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run the server until `signal` resolves.
    pub async fn run_until<F>(self, listener: TcpListener, signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            socket_path = %self.config.listener.socket_path,
            "Bridge server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("Bridge server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
