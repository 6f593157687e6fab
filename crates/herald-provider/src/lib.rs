// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external delivery provider API.
//!
//! Provides [`HttpDeliveryProvider`], which implements both the
//! [`DeliveryProvider`] contract (`POST /v1/workflows/{key}/trigger`, once
//! per recipient) and the [`WorkflowCatalog`] lookup
//! (`GET /v1/workflows/{key}`). Errors from `trigger` are surfaced as
//! `Provider` errors so the queue's retry policy treats them as transient;
//! a missing workflow resolves to `None` and is a permanent failure there.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use herald_config::model::ProviderConfig;
use herald_core::types::{
    ComponentKind, HealthStatus, NotificationPayload, TriggerReceipt, WorkflowConfig,
};
use herald_core::{Component, DeliveryProvider, HeraldError, WorkflowCatalog};

/// Request body for a trigger call.
#[derive(Debug, Serialize)]
struct TriggerRequest<'a> {
    recipient: &'a str,
    payload: &'a NotificationPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    overrides: Option<&'a serde_json::Value>,
}

/// Response body for a successful trigger call.
#[derive(Debug, Deserialize)]
struct TriggerResponse {
    transaction_id: String,
}

/// Error body returned by the provider API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: String,
}

/// HTTP client for the delivery provider API.
///
/// Manages authentication headers, connection pooling, and timeouts. The
/// client performs no internal retries; retry scheduling belongs to the
/// delivery queue.
#[derive(Debug, Clone)]
pub struct HttpDeliveryProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeliveryProvider {
    /// Creates a new provider client from configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, HeraldError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| HeraldError::Config(format!("invalid API key header value: {e}")))?;
            headers.insert("authorization", value);
        }
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HeraldError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Extract an error message from a failed provider response.
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if let Ok(api_err) = serde_json::from_str::<ApiErrorResponse>(&body) {
            format!("provider API error ({status}): {}", api_err.error)
        } else {
            format!("provider API returned {status}: {body}")
        }
    }
}

#[async_trait]
impl Component for HttpDeliveryProvider {
    fn name(&self) -> &str {
        "http-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        let url = format!("{}/v1/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(resp) => Ok(HealthStatus::Degraded(format!(
                "provider health returned {}",
                resp.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "provider unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        Ok(())
    }
}

#[async_trait]
impl DeliveryProvider for HttpDeliveryProvider {
    async fn trigger(
        &self,
        workflow_key: &str,
        recipient: &str,
        payload: &NotificationPayload,
        overrides: Option<&serde_json::Value>,
    ) -> Result<TriggerReceipt, HeraldError> {
        let url = format!("{}/v1/workflows/{workflow_key}/trigger", self.base_url);
        let body = TriggerRequest {
            recipient,
            payload,
            overrides,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| HeraldError::Provider {
                message: format!("trigger request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HeraldError::Provider {
                message: Self::error_message(response).await,
                source: None,
            });
        }

        let receipt: TriggerResponse =
            response.json().await.map_err(|e| HeraldError::Provider {
                message: format!("malformed trigger response: {e}"),
                source: Some(Box::new(e)),
            })?;

        debug!(
            workflow = workflow_key,
            recipient,
            transaction_id = %receipt.transaction_id,
            "delivery triggered"
        );

        Ok(TriggerReceipt {
            transaction_id: receipt.transaction_id,
        })
    }
}

#[async_trait]
impl WorkflowCatalog for HttpDeliveryProvider {
    async fn resolve(
        &self,
        workflow_key: &str,
    ) -> Result<Option<WorkflowConfig>, HeraldError> {
        let url = format!("{}/v1/workflows/{workflow_key}", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HeraldError::Provider {
                message: format!("workflow lookup failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        match response.status() {
            s if s.is_success() => {
                let config: WorkflowConfig =
                    response.json().await.map_err(|e| HeraldError::Provider {
                        message: format!("malformed workflow response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                Ok(Some(config))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            _ => Err(HeraldError::Provider {
                message: Self::error_message(response).await,
                source: None,
            }),
        }
    }
}
