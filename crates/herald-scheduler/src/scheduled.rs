// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot scheduled processor.
//!
//! Polls the record store on a fixed interval for due future-dated
//! records and enqueues them. An `is_processing` guard skips (never
//! queues) overlapping ticks. Records due within a short horizon also get
//! a delayed-enqueue task so they do not wait out the next poll.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use herald_config::model::SchedulerConfig;
use herald_core::types::{ComponentKind, HealthStatus, NotificationStatus};
use herald_core::{Component, HeraldError, RecordStore};
use herald_queue::DeliveryQueue;

/// What a tick did (or why it did nothing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick ran: how many due records were enqueued and how many
    /// upcoming records were armed for delayed enqueue.
    Ran { enqueued: usize, armed: usize },
    /// The previous tick was still running.
    SkippedOverlap,
    /// Production is paused.
    SkippedPaused,
}

struct ProcessorInner {
    store: Arc<dyn RecordStore>,
    queue: DeliveryQueue,
    poll_interval: Duration,
    batch_size: u32,
    horizon: chrono::Duration,
    is_processing: AtomicBool,
    /// Records with a pending delayed-enqueue task, armed at most once.
    armed: Mutex<HashSet<i64>>,
    paused: AtomicBool,
    started: AtomicBool,
    stopping: CancellationToken,
}

/// Periodically promotes due scheduled records into the delivery queue.
#[derive(Clone)]
pub struct ScheduledProcessor {
    inner: Arc<ProcessorInner>,
}

impl ScheduledProcessor {
    pub fn new(
        config: &SchedulerConfig,
        store: Arc<dyn RecordStore>,
        queue: DeliveryQueue,
    ) -> Self {
        Self {
            inner: Arc::new(ProcessorInner {
                store,
                queue,
                poll_interval: Duration::from_secs(config.poll_interval_secs),
                batch_size: config.batch_size,
                horizon: chrono::Duration::hours(config.horizon_hours as i64),
                is_processing: AtomicBool::new(false),
                armed: Mutex::new(HashSet::new()),
                paused: AtomicBool::new(false),
                started: AtomicBool::new(false),
                stopping: CancellationToken::new(),
            }),
        }
    }

    /// Run the poll loop until stopped.
    ///
    /// A failed tick is logged; the next poll interval doubles as the
    /// back-off before the store is retried.
    pub async fn run(&self) {
        self.inner.started.store(true, Ordering::SeqCst);
        info!(
            interval_secs = self.inner.poll_interval.as_secs(),
            batch_size = self.inner.batch_size,
            "scheduled processor started"
        );

        loop {
            tokio::select! {
                _ = self.inner.stopping.cancelled() => break,
                _ = tokio::time::sleep(self.inner.poll_interval) => {}
            }

            match self.tick().await {
                Ok(TickOutcome::Ran { enqueued, armed }) if enqueued > 0 || armed > 0 => {
                    info!(enqueued, armed, "scheduled tick processed records");
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "scheduled tick failed, backing off until next poll");
                }
            }
        }

        info!("scheduled processor stopped");
    }

    /// Run a single tick. Public so the control surface can force a
    /// reconciliation pass outside the timer.
    pub async fn tick(&self) -> Result<TickOutcome, HeraldError> {
        if self.inner.paused.load(Ordering::SeqCst) {
            return Ok(TickOutcome::SkippedPaused);
        }
        if self.inner.is_processing.swap(true, Ordering::SeqCst) {
            warn!("previous tick still running, skipping");
            return Ok(TickOutcome::SkippedOverlap);
        }

        let result = self.tick_inner().await;
        self.inner.is_processing.store(false, Ordering::SeqCst);
        result
    }

    async fn tick_inner(&self) -> Result<TickOutcome, HeraldError> {
        let inner = &self.inner;
        let now = Utc::now();

        // Due records: enqueue each; one record's outcome never aborts
        // the batch (enqueue drops or dedups individually).
        let due = inner.store.fetch_due(now, inner.batch_size).await?;
        let mut enqueued = 0;
        for record in &due {
            inner.armed.lock().expect("armed lock").remove(&record.id);
            if inner.queue.enqueue(record) == herald_queue::EnqueueOutcome::Queued {
                enqueued += 1;
            }
        }

        // Short-horizon records: arm a delayed enqueue, at most once per
        // record. Farther-out records rely purely on the poll.
        let upcoming = inner
            .store
            .fetch_upcoming(now, inner.horizon, inner.batch_size)
            .await?;
        let mut armed_count = 0;
        for record in upcoming {
            let Some(at) = record.scheduled_for else { continue };
            {
                let mut armed = inner.armed.lock().expect("armed lock");
                if !armed.insert(record.id) {
                    continue;
                }
            }
            armed_count += 1;
            let delay = (at - now).to_std().unwrap_or_default();
            debug!(record = record.id, delay_secs = delay.as_secs(), "armed delayed enqueue");

            let arm_inner = Arc::clone(inner);
            let record_id = record.id;
            tokio::spawn(async move {
                tokio::select! {
                    _ = arm_inner.stopping.cancelled() => {
                        arm_inner.armed.lock().expect("armed lock").remove(&record_id);
                    }
                    _ = tokio::time::sleep(delay) => {
                        arm_inner.armed.lock().expect("armed lock").remove(&record_id);
                        if arm_inner.paused.load(Ordering::SeqCst) {
                            return;
                        }
                        match arm_inner.store.fetch_record(record_id).await {
                            Ok(Some(fresh))
                                if fresh.status == NotificationStatus::Pending
                                    && fresh.publish_status.is_deliverable() =>
                            {
                                arm_inner.queue.enqueue(&fresh);
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!(record = record_id, error = %e, "delayed enqueue fetch failed; poller will retry");
                            }
                        }
                    }
                }
            });
        }

        Ok(TickOutcome::Ran {
            enqueued,
            armed: armed_count,
        })
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        info!("scheduled processor paused");
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        info!("scheduled processor resumed");
    }

    /// Records currently armed for delayed enqueue.
    pub fn armed_count(&self) -> usize {
        self.inner.armed.lock().expect("armed lock").len()
    }
}

#[async_trait]
impl Component for ScheduledProcessor {
    fn name(&self) -> &str {
        "scheduled-processor"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Scheduler
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        if self.inner.stopping.is_cancelled() {
            return Ok(HealthStatus::Unhealthy("stopped".into()));
        }
        if !self.inner.started.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Unhealthy("not started".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        self.inner.stopping.cancel();
        Ok(())
    }
}
