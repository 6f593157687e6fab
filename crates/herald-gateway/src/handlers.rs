// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for health, metrics, and control.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use herald_core::types::HealthStatus;
use herald_supervisor::SupervisorState;

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Aggregate status: healthy, degraded, or unhealthy.
    pub status: String,
    /// Seconds since the supervisor last started.
    pub uptime_secs: u64,
    /// ISO 8601 timestamp of this response.
    pub timestamp: String,
}

/// Per-component entry in GET /health/detailed.
#[derive(Debug, Serialize)]
pub struct ComponentEntry {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Queue statistics in GET /health/detailed.
#[derive(Debug, Serialize)]
pub struct QueueEntry {
    pub depth: usize,
    pub active: usize,
    pub dropped: u64,
    pub oldest_age_secs: Option<u64>,
}

/// Response body for GET /health/detailed.
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub state: SupervisorState,
    pub uptime_secs: u64,
    pub timestamp: String,
    pub version: String,
    pub components: Vec<ComponentEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueEntry>,
}

/// Response body for GET /health/subscriptions.
#[derive(Debug, Serialize)]
pub struct SubscriptionsResponse {
    pub total: usize,
    pub active: usize,
    pub failed: usize,
    pub reconnecting: usize,
}

/// Response body for the control endpoints.
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub state: SupervisorState,
    pub paused: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn status_code_for(status: &HealthStatus) -> StatusCode {
    // Degraded still serves traffic; only unhealthy returns 503.
    match status {
        HealthStatus::Healthy | HealthStatus::Degraded(_) => StatusCode::OK,
        HealthStatus::Unhealthy(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn detail_of(status: &HealthStatus) -> Option<String> {
    match status {
        HealthStatus::Healthy => None,
        HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
            Some(reason.clone())
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let report = state.supervisor.health();
    let body = HealthResponse {
        status: report.status.label().to_string(),
        uptime_secs: state.supervisor.uptime().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    (status_code_for(&report.status), Json(body)).into_response()
}

/// GET /health/detailed
///
/// Recomputes component health instead of serving the cached snapshot.
pub async fn get_health_detailed(State(state): State<GatewayState>) -> Response {
    let report = state.supervisor.check_health().await;

    let components = report
        .components
        .iter()
        .map(|c| ComponentEntry {
            name: c.name.clone(),
            status: c.status.label().to_string(),
            detail: detail_of(&c.status),
        })
        .collect();

    let queue = state.supervisor.queue_stats().map(|stats| QueueEntry {
        depth: stats.depth,
        active: stats.active,
        dropped: stats.dropped,
        oldest_age_secs: stats.oldest_age.map(|age| age.as_secs()),
    });

    let body = DetailedHealthResponse {
        status: report.status.label().to_string(),
        state: report.state,
        uptime_secs: state.supervisor.uptime().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        components,
        queue,
    };
    (status_code_for(&report.status), Json(body)).into_response()
}

/// GET /health/subscriptions
pub async fn get_health_subscriptions(
    State(state): State<GatewayState>,
) -> Json<SubscriptionsResponse> {
    let counts = state.supervisor.subscription_counts();
    Json(SubscriptionsResponse {
        total: counts.total,
        active: counts.active,
        failed: counts.failed,
        reconnecting: counts.reconnecting,
    })
}

/// GET /metrics
///
/// Prometheus text exposition format.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "metrics are not enabled".to_string(),
            }),
        )
            .into_response(),
    }
}

/// POST /control/start
pub async fn post_start(State(state): State<GatewayState>) -> Response {
    match state.supervisor.start().await {
        Ok(()) => Json(ControlResponse {
            state: state.supervisor.state(),
            paused: state.supervisor.is_paused(),
        })
        .into_response(),
        Err(e) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// POST /control/stop
///
/// Child shutdown errors are collected and logged server-side; the stop
/// itself always completes.
pub async fn post_stop(State(state): State<GatewayState>) -> Json<ControlResponse> {
    let errors = state.supervisor.stop().await;
    if !errors.is_empty() {
        tracing::warn!(errors = errors.len(), "control stop completed with child errors");
    }
    Json(ControlResponse {
        state: state.supervisor.state(),
        paused: state.supervisor.is_paused(),
    })
}

/// POST /control/pause
pub async fn post_pause(State(state): State<GatewayState>) -> Json<ControlResponse> {
    state.supervisor.pause();
    Json(ControlResponse {
        state: state.supervisor.state(),
        paused: state.supervisor.is_paused(),
    })
}

/// POST /control/resume
pub async fn post_resume(State(state): State<GatewayState>) -> Json<ControlResponse> {
    state.supervisor.resume();
    Json(ControlResponse {
        state: state.supervisor.state(),
        paused: state.supervisor.is_paused(),
    })
}

/// POST /control/reconcile
pub async fn post_reconcile(State(state): State<GatewayState>) -> Response {
    match state.supervisor.reconcile().await {
        Ok(()) => Json(ControlResponse {
            state: state.supervisor.state(),
            paused: state.supervisor.is_paused(),
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /control/status
pub async fn get_control_status(State(state): State<GatewayState>) -> Json<ControlResponse> {
    Json(ControlResponse {
        state: state.supervisor.state(),
        paused: state.supervisor.is_paused(),
    })
}
