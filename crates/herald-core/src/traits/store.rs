// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store contract: persistence plus change-event subscription.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::HeraldError;
use crate::traits::component::Component;
use crate::types::{
    NewNotification, NotificationRecord, NotificationStatus, RecordInserted, Rule,
};

/// The persistent store holding notification records and rules.
///
/// Status transitions are guarded in the store itself: claiming a record
/// for processing only succeeds from `Pending`, and terminal states are
/// never overwritten by automatic processing.
#[async_trait]
pub trait RecordStore: Component {
    /// Insert a new record and return its id. Publishes a
    /// [`RecordInserted`] event to all insert subscribers.
    async fn insert_record(&self, new: &NewNotification) -> Result<i64, HeraldError>;

    /// Fetch a record by id.
    async fn fetch_record(&self, id: i64) -> Result<Option<NotificationRecord>, HeraldError>;

    /// Fetch `Pending`/`Publish` records whose `scheduled_for` is at or
    /// before `now`, oldest first, at most `limit`.
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>, HeraldError>;

    /// Fetch `Pending`/`Publish` records scheduled strictly after `now`
    /// but within `now + horizon`, oldest first, at most `limit`.
    async fn fetch_upcoming(
        &self,
        now: DateTime<Utc>,
        horizon: chrono::Duration,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>, HeraldError>;

    /// Claim a record for processing (`Pending -> Processing`).
    ///
    /// Returns `false` when the record was not in `Pending` -- already
    /// claimed, already terminal, or missing. A `false` claim means the
    /// caller must not process the record.
    async fn claim_record(&self, id: i64) -> Result<bool, HeraldError>;

    /// Write a terminal (or retry-pending) outcome: status, structured
    /// error details, collected transaction ids, and `processed_at`.
    async fn finish_record(
        &self,
        id: i64,
        status: NotificationStatus,
        error_details: Option<serde_json::Value>,
        transaction_ids: &[String],
    ) -> Result<(), HeraldError>;

    /// Cancel a record (`Pending`/`Processing -> Retracted`).
    ///
    /// Returns `false` when the record was already terminal or missing.
    async fn retract_record(&self, id: i64) -> Result<bool, HeraldError>;

    /// List all cron-type rules, schedulable or not. The scheduler applies
    /// its own eligibility filter so it can count failed/ineligible rules.
    async fn list_cron_rules(&self) -> Result<Vec<Rule>, HeraldError>;

    /// Record that a rule fired (bookkeeping only).
    async fn touch_rule_executed(
        &self,
        rule_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), HeraldError>;

    /// Subscribe to "record inserted" events.
    ///
    /// Every insert through this store reaches every active receiver.
    /// Dropping the receiver tears the subscription down.
    fn subscribe_inserts(&self) -> broadcast::Receiver<RecordInserted>;
}
