// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes and shared state. Health and metrics routes are public;
//! the thin control routes map directly onto supervisor lifecycle calls.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use herald_core::HeraldError;
use herald_supervisor::Supervisor;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Supervisor handle driving health and control operations.
    pub supervisor: Supervisor,
    /// Optional Prometheus metrics render function for /metrics.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/health/detailed", get(handlers::get_health_detailed))
        .route(
            "/health/subscriptions",
            get(handlers::get_health_subscriptions),
        )
        .route("/metrics", get(handlers::get_metrics))
        .route("/control/start", post(handlers::post_start))
        .route("/control/stop", post(handlers::post_stop))
        .route("/control/pause", post(handlers::post_pause))
        .route("/control/resume", post(handlers::post_resume))
        .route("/control/reconcile", post(handlers::post_reconcile))
        .route("/control/status", get(handlers::get_control_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the listener for the gateway.
///
/// Split from [`serve`] so callers can learn the bound address before the
/// server starts accepting (port 0 binds to an ephemeral port).
pub async fn bind(host: &str, port: u16) -> Result<tokio::net::TcpListener, HeraldError> {
    let addr = format!("{host}:{port}");
    tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HeraldError::Config(format!("failed to bind gateway to {addr}: {e}")))
}

/// Serve the gateway on an already-bound listener until the process ends.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: GatewayState,
) -> Result<(), HeraldError> {
    let addr = listener
        .local_addr()
        .map_err(|e| HeraldError::Internal(format!("gateway local_addr: {e}")))?;
    tracing::info!(%addr, "gateway server listening");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| HeraldError::Internal(format!("gateway server error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_rejects_bad_host() {
        let result = bind("definitely not a host", 0).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn bind_ephemeral_port() {
        let listener = bind("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }
}
