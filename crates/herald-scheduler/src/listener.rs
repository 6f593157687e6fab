// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change ingestion listener.
//!
//! Subscribes to the store's "record inserted" events, scoped to an
//! optional tenant filter. Each event is re-fetched by id before enqueue
//! as a defense against partial event payloads. Malformed events are
//! logged and dropped, never retried: the originating record may not
//! exist.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use herald_config::model::ListenerConfig;
use herald_core::types::{ComponentKind, HealthStatus, NotificationStatus, RecordInserted};
use herald_core::{Component, HeraldError, RecordStore};
use herald_queue::DeliveryQueue;

struct ListenerInner {
    store: Arc<dyn RecordStore>,
    queue: DeliveryQueue,
    enterprise_filter: Option<String>,
    backoff: Duration,
    paused: AtomicBool,
    started: AtomicBool,
    running: AtomicBool,
    dropped_events: AtomicU64,
    stopping: CancellationToken,
}

/// Forwards newly inserted deliverable records into the delivery queue.
#[derive(Clone)]
pub struct ChangeListener {
    inner: Arc<ListenerInner>,
}

impl ChangeListener {
    pub fn new(
        config: &ListenerConfig,
        store: Arc<dyn RecordStore>,
        queue: DeliveryQueue,
    ) -> Self {
        Self {
            inner: Arc::new(ListenerInner {
                store,
                queue,
                enterprise_filter: config.enterprise_id.clone(),
                backoff: Duration::from_secs(config.backoff_secs),
                paused: AtomicBool::new(false),
                started: AtomicBool::new(false),
                running: AtomicBool::new(false),
                dropped_events: AtomicU64::new(0),
                stopping: CancellationToken::new(),
            }),
        }
    }

    /// Run until stopped. The subscription is torn down when the loop
    /// exits (the receiver is dropped), so no events are delivered after
    /// shutdown begins.
    pub async fn run(&self) {
        let inner = &self.inner;
        inner.started.store(true, Ordering::SeqCst);
        inner.running.store(true, Ordering::SeqCst);

        let mut rx = inner.store.subscribe_inserts();
        info!(
            tenant = inner.enterprise_filter.as_deref().unwrap_or("*"),
            "change listener started"
        );

        loop {
            tokio::select! {
                _ = inner.stopping.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "insert events lagged; the poller picks up stragglers");
                    }
                    Err(RecvError::Closed) => {
                        warn!("insert event channel closed, listener exiting");
                        break;
                    }
                }
            }
        }

        inner.running.store(false, Ordering::SeqCst);
        info!("change listener stopped");
    }

    async fn handle_event(&self, event: RecordInserted) {
        let inner = &self.inner;

        if inner.paused.load(Ordering::SeqCst) {
            debug!(record = event.record_id, "listener paused, ignoring insert event");
            return;
        }

        if let Some(filter) = &inner.enterprise_filter {
            if event.enterprise_id != *filter {
                debug!(
                    record = event.record_id,
                    enterprise = %event.enterprise_id,
                    "insert event outside tenant filter, ignoring"
                );
                return;
            }
        }

        if event.record_id <= 0 {
            inner.dropped_events.fetch_add(1, Ordering::SeqCst);
            warn!(record = event.record_id, "malformed insert event, dropping");
            return;
        }

        // Fetch the full record: the event payload alone is not trusted.
        let record = match inner.store.fetch_record(event.record_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                inner.dropped_events.fetch_add(1, Ordering::SeqCst);
                warn!(record = event.record_id, "inserted record not found, dropping event");
                return;
            }
            Err(e) => {
                inner.dropped_events.fetch_add(1, Ordering::SeqCst);
                error!(record = event.record_id, error = %e, "record fetch failed, dropping event");
                // Infrastructure failure: back off instead of spinning on
                // a broken store connection.
                tokio::select! {
                    _ = inner.stopping.cancelled() => {}
                    _ = tokio::time::sleep(inner.backoff) => {}
                }
                return;
            }
        };

        if record.enterprise_id != event.enterprise_id {
            inner.dropped_events.fetch_add(1, Ordering::SeqCst);
            warn!(
                record = record.id,
                expected = %event.enterprise_id,
                actual = %record.enterprise_id,
                "record does not belong to the event's tenant, dropping"
            );
            return;
        }

        if record.status != NotificationStatus::Pending
            || !record.publish_status.is_deliverable()
        {
            debug!(
                record = record.id,
                status = %record.status,
                publish_status = %record.publish_status,
                "record not deliverable, leaving for later eligibility"
            );
            return;
        }

        // Future-dated records belong to the scheduled processor.
        if record.scheduled_for.is_some_and(|at| at > Utc::now()) {
            debug!(record = record.id, "record is future-scheduled, leaving to the processor");
            return;
        }

        self.inner.queue.enqueue(&record);
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        info!("change listener paused");
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        info!("change listener resumed");
    }

    /// Events dropped as malformed (missing record, tenant mismatch).
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped_events.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Component for ChangeListener {
    fn name(&self) -> &str {
        "change-listener"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Listener
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        let inner = &self.inner;
        if inner.stopping.is_cancelled() {
            return Ok(HealthStatus::Unhealthy("stopped".into()));
        }
        if !inner.started.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Unhealthy("not started".into()));
        }
        if !inner.running.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Unhealthy("listener loop exited unexpectedly".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        self.inner.stopping.cancel();
        Ok(())
    }
}
