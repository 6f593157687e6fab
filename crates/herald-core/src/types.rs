// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Herald workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// A delivery channel a notification can target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Push,
    Sms,
    Chat,
    InApp,
}

/// Delivery status of a notification record.
///
/// Transitions: `Pending -> Processing -> {Sent | Partial | Failed}`, with
/// `Retracted` reachable from `Pending` and `Processing` via cancellation.
/// The three right-hand states plus `Retracted` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Processing,
    Sent,
    Partial,
    Failed,
    Retracted,
}

impl NotificationStatus {
    /// Whether this status admits no further automatic processing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Sent
                | NotificationStatus::Partial
                | NotificationStatus::Failed
                | NotificationStatus::Retracted
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: NotificationStatus) -> bool {
        use NotificationStatus::*;
        match (self, next) {
            (Pending, Processing) | (Pending, Retracted) => true,
            (Processing, Sent) | (Processing, Partial) | (Processing, Failed) => true,
            (Processing, Retracted) => true,
            // Retries re-enter processing from a transient failure only
            // through the queue, which re-claims from Processing itself.
            (Processing, Processing) => true,
            _ => false,
        }
    }
}

/// Publication gate on a notification record.
///
/// Only `Publish` records are eligible for delivery; the gate is re-checked
/// before every attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Draft,
    Publish,
    Discard,
    Deleted,
    None,
}

impl PublishStatus {
    /// Whether a record with this publish status may be delivered.
    pub fn is_deliverable(&self) -> bool {
        matches!(self, PublishStatus::Publish)
    }
}

/// Notification content, tagged by content kind.
///
/// Payloads are validated at the ingestion boundary: an unknown `kind` or a
/// shape mismatch is a serde error before the record ever reaches the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationPayload {
    /// Plain message content for push, chat, and in-app channels.
    Message {
        #[serde(default)]
        title: Option<String>,
        body: String,
    },
    /// Email content with a subject line and optional HTML alternative.
    Email {
        subject: String,
        body: String,
        #[serde(default)]
        html: Option<String>,
    },
    /// SMS text content.
    Sms { text: String },
}

/// A persisted notification record -- the unit of delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Store-assigned identity.
    pub id: i64,
    /// Optional idempotency key.
    pub transaction_uuid: Option<Uuid>,
    /// Owning tenant.
    pub enterprise_id: String,
    /// Optional sub-tenant.
    pub business_id: Option<String>,
    /// The workflow this record targets.
    pub workflow_key: String,
    pub payload: NotificationPayload,
    /// Recipient identifiers; each must be UUID-formatted.
    pub recipients: Vec<String>,
    pub channels: Vec<Channel>,
    /// Per-channel overrides, passed through to the provider verbatim.
    pub overrides: Option<serde_json::Value>,
    pub status: NotificationStatus,
    pub publish_status: PublishStatus,
    /// Absent means "deliver as soon as possible".
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Structured failure / partial-result breakdown.
    pub error_details: Option<serde_json::Value>,
    /// Provider transaction ids collected from successful recipient calls.
    pub transaction_ids: Option<Vec<String>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Whether the delivery pipeline may attempt this record right now.
    pub fn is_deliverable(&self) -> bool {
        self.publish_status.is_deliverable() && !self.status.is_terminal()
    }
}

/// Insert shape for a notification record (no id, no timestamps).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    #[serde(default)]
    pub transaction_uuid: Option<Uuid>,
    pub enterprise_id: String,
    #[serde(default)]
    pub business_id: Option<String>,
    pub workflow_key: String,
    pub payload: NotificationPayload,
    pub recipients: Vec<String>,
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub overrides: Option<serde_json::Value>,
    pub publish_status: PublishStatus,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Trigger type of a recurring rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Cron,
}

/// Trigger configuration of a cron rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub cron_expression: String,
    /// IANA timezone name; `None` means UTC.
    #[serde(default)]
    pub timezone: Option<String>,
    pub enabled: bool,
}

/// A recurring trigger definition.
///
/// Created and updated by an external management surface; read-only to this
/// core except for `last_executed_at` bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub enterprise_id: String,
    pub trigger_type: TriggerType,
    pub trigger: TriggerConfig,
    pub workflow_key: String,
    /// Template materialized into a `NotificationPayload` on each fire.
    pub payload_template: serde_json::Value,
    /// Recipients the materialized record targets.
    pub recipients: Vec<String>,
    pub channels: Vec<Channel>,
    pub publish_status: PublishStatus,
    pub deactivated: bool,
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl Rule {
    /// A `CronJobHandle` exists iff this returns true.
    pub fn is_schedulable(&self) -> bool {
        self.trigger_type == TriggerType::Cron
            && self.trigger.enabled
            && self.publish_status == PublishStatus::Publish
            && !self.deactivated
    }
}

/// Composite key identifying a scheduled rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleKey {
    pub enterprise_id: String,
    pub rule_id: i64,
}

impl RuleKey {
    pub fn new(enterprise_id: impl Into<String>, rule_id: i64) -> Self {
        Self {
            enterprise_id: enterprise_id.into(),
            rule_id,
        }
    }
}

impl std::fmt::Display for RuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.enterprise_id, self.rule_id)
    }
}

/// Health status reported by component health checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Component is fully operational.
    Healthy,
    /// Component is operational but experiencing issues.
    Degraded(String),
    /// Component is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Wire label used by the health endpoints.
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded(_) => "degraded",
            HealthStatus::Unhealthy(_) => "unhealthy",
        }
    }
}

/// Identifies the kind of supervised component.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ComponentKind {
    Store,
    Provider,
    Queue,
    Scheduler,
    Listener,
    Gateway,
    Observability,
}

/// Receipt returned by the delivery provider for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerReceipt {
    pub transaction_id: String,
}

/// Per-recipient delivery outcome, collected during fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientOutcome {
    pub recipient: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RecipientOutcome {
    pub fn succeeded(&self) -> bool {
        self.transaction_id.is_some() && self.error.is_none()
    }
}

/// Workflow configuration resolved from the external catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub key: String,
    pub name: String,
    pub channels: Vec<Channel>,
    pub enabled: bool,
}

/// "Row inserted" event published by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInserted {
    pub record_id: i64,
    pub enterprise_id: String,
}
