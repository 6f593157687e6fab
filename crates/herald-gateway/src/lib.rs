// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway exposing health, metrics, and the thin control surface.
//!
//! The gateway runs an axum server as a background task. Health endpoints
//! report the supervisor's aggregate view; control endpoints map directly
//! onto supervisor lifecycle calls (pause, resume, reconcile, status).

pub mod handlers;
pub mod server;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use herald_config::model::GatewayConfig;
use herald_core::types::{ComponentKind, HealthStatus};
use herald_core::{Component, HeraldError};
use herald_supervisor::Supervisor;

use crate::server::GatewayState;

/// The gateway component: owns the server task.
pub struct HeraldGateway {
    config: GatewayConfig,
    state: GatewayState,
    server_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl HeraldGateway {
    pub fn new(
        config: GatewayConfig,
        supervisor: Supervisor,
        prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    ) -> Self {
        Self {
            config,
            state: GatewayState {
                supervisor,
                prometheus_render,
            },
            server_handle: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Bind and start serving in a background task.
    ///
    /// Returns the bound address (useful with port 0).
    pub async fn start(&self) -> Result<SocketAddr, HeraldError> {
        let listener = server::bind(&self.config.host, self.config.port).await?;
        let addr = listener
            .local_addr()
            .map_err(|e| HeraldError::Internal(format!("gateway local_addr: {e}")))?;

        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = server::serve(listener, state).await {
                tracing::error!(error = %e, "gateway server error");
            }
        });

        *self.server_handle.lock().await = Some(handle);
        *self.local_addr.lock().await = Some(addr);
        Ok(addr)
    }

    /// The address the server is bound to, once started.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }
}

#[async_trait]
impl Component for HeraldGateway {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        let handle = self.server_handle.lock().await;
        match handle.as_ref() {
            Some(task) if !task.is_finished() => Ok(HealthStatus::Healthy),
            Some(_) => Ok(HealthStatus::Unhealthy("server task exited".to_string())),
            None => Ok(HealthStatus::Unhealthy("server not started".to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        let mut handle = self.server_handle.lock().await;
        if let Some(task) = handle.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Constructing a HeraldGateway needs a Supervisor rig; the HTTP
    // behavior is covered by tests/gateway_tests.rs against a live
    // ephemeral-port server.

    #[test]
    fn gateway_config_defaults() {
        let config = GatewayConfig::default();
        assert!(config.enabled);
        assert_eq!(config.host, "127.0.0.1");
    }
}
