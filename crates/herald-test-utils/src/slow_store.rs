// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A record store wrapper that injects latency, for overlap-guard tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use herald_core::types::{
    ComponentKind, HealthStatus, NewNotification, NotificationRecord, NotificationStatus,
    RecordInserted, Rule,
};
use herald_core::{Component, HeraldError, RecordStore};

/// Delegates every call to the wrapped store, sleeping `delay` first on
/// the write paths. Lets tests hold a producer "executing" long enough to
/// observe overlap guards.
pub struct SlowStore {
    inner: Arc<dyn RecordStore>,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<dyn RecordStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl Component for SlowStore {
    fn name(&self) -> &str {
        "slow-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl RecordStore for SlowStore {
    async fn insert_record(&self, new: &NewNotification) -> Result<i64, HeraldError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_record(new).await
    }

    async fn fetch_record(&self, id: i64) -> Result<Option<NotificationRecord>, HeraldError> {
        self.inner.fetch_record(id).await
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>, HeraldError> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_due(now, limit).await
    }

    async fn fetch_upcoming(
        &self,
        now: DateTime<Utc>,
        horizon: chrono::Duration,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>, HeraldError> {
        self.inner.fetch_upcoming(now, horizon, limit).await
    }

    async fn claim_record(&self, id: i64) -> Result<bool, HeraldError> {
        self.inner.claim_record(id).await
    }

    async fn finish_record(
        &self,
        id: i64,
        status: NotificationStatus,
        error_details: Option<serde_json::Value>,
        transaction_ids: &[String],
    ) -> Result<(), HeraldError> {
        self.inner
            .finish_record(id, status, error_details, transaction_ids)
            .await
    }

    async fn retract_record(&self, id: i64) -> Result<bool, HeraldError> {
        self.inner.retract_record(id).await
    }

    async fn list_cron_rules(&self) -> Result<Vec<Rule>, HeraldError> {
        self.inner.list_cron_rules().await
    }

    async fn touch_rule_executed(
        &self,
        rule_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), HeraldError> {
        self.inner.touch_rule_executed(rule_id, at).await
    }

    fn subscribe_inserts(&self) -> broadcast::Receiver<RecordInserted> {
        self.inner.subscribe_inserts()
    }
}
