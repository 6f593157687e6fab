// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery provider and workflow catalog contracts.

use async_trait::async_trait;

use crate::error::HeraldError;
use crate::traits::component::Component;
use crate::types::{NotificationPayload, TriggerReceipt, WorkflowConfig};

/// The external service that performs actual channel delivery.
///
/// Invoked once per recipient; there is no batching guarantee. Errors from
/// `trigger` are treated as transient by the queue's retry policy.
#[async_trait]
pub trait DeliveryProvider: Component {
    /// Trigger delivery of `payload` to a single recipient through the
    /// named workflow. Returns the provider's transaction identifier.
    async fn trigger(
        &self,
        workflow_key: &str,
        recipient: &str,
        payload: &NotificationPayload,
        overrides: Option<&serde_json::Value>,
    ) -> Result<TriggerReceipt, HeraldError>;
}

/// Read-only lookup of workflow configurations.
///
/// Resolution happens per delivery attempt; a missing workflow is a
/// permanent failure for the record that references it.
#[async_trait]
pub trait WorkflowCatalog: Send + Sync + 'static {
    /// Resolve a workflow by key. `Ok(None)` means the workflow does not
    /// exist; `Err` means the catalog itself could not be reached.
    async fn resolve(&self, workflow_key: &str) -> Result<Option<WorkflowConfig>, HeraldError>;
}
