// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bounded in-process delivery queue and its processing loop.
//!
//! `enqueue` appends unless the queue is at capacity, in which case the
//! item is dropped and counted. The processing loop is an explicit loop
//! owned by a cancellable task: it pulls items while capacity allows,
//! sleeps briefly when idle, and drains in-flight work (bounded by a
//! timeout) when stopped.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use herald_config::model::QueueConfig;
use herald_core::types::{ComponentKind, HealthStatus};
use herald_core::{
    Component, DeliveryProvider, HeraldError, NotificationRecord, RecordStore, WorkflowCatalog,
};

use crate::item::{EnqueueOutcome, QueueItem};
use crate::worker;

/// Queue depth fraction above which the queue reports degraded health.
const DEPTH_HEALTH_FRACTION: f64 = 0.8;

/// Point-in-time queue statistics for health and metrics surfaces.
#[derive(Debug, Clone, Copy)]
pub struct QueueStats {
    pub depth: usize,
    pub active: usize,
    pub dropped: u64,
    pub oldest_age: Option<Duration>,
}

pub(crate) struct QueueInner {
    pub(crate) config: QueueConfig,
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) provider: Arc<dyn DeliveryProvider>,
    pub(crate) catalog: Arc<dyn WorkflowCatalog>,
    items: Mutex<VecDeque<QueueItem>>,
    /// Job keys (record ids) currently queued, processing, or awaiting retry.
    in_flight: Mutex<HashSet<i64>>,
    pub(crate) active: AtomicUsize,
    dropped: AtomicU64,
    paused: AtomicBool,
    started: AtomicBool,
    running: AtomicBool,
    pub(crate) stopping: CancellationToken,
}

impl QueueInner {
    /// Append an initial item unless at capacity or already in flight.
    fn push_initial(&self, item: QueueItem) -> EnqueueOutcome {
        let mut items = self.items.lock().expect("queue lock");
        let mut in_flight = self.in_flight.lock().expect("in-flight lock");

        if in_flight.contains(&item.record_id) {
            return EnqueueOutcome::Deduplicated;
        }
        if items.len() >= self.config.max_queue_size {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            herald_prometheus::record_dropped();
            return EnqueueOutcome::Dropped;
        }

        in_flight.insert(item.record_id);
        items.push_back(item);
        herald_prometheus::set_queue_depth(items.len() as f64);
        EnqueueOutcome::Queued
    }

    /// Re-append a retry at the tail. The job key stays in flight across
    /// the backoff wait, so only the capacity check applies.
    pub(crate) fn push_retry(&self, item: QueueItem) -> EnqueueOutcome {
        let mut items = self.items.lock().expect("queue lock");
        if items.len() >= self.config.max_queue_size {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            herald_prometheus::record_dropped();
            return EnqueueOutcome::Dropped;
        }
        items.push_back(item);
        herald_prometheus::set_queue_depth(items.len() as f64);
        EnqueueOutcome::Queued
    }

    fn pop(&self) -> Option<QueueItem> {
        let mut items = self.items.lock().expect("queue lock");
        let item = items.pop_front();
        herald_prometheus::set_queue_depth(items.len() as f64);
        item
    }

    /// Release a job key once its delivery reached a terminal outcome.
    pub(crate) fn release(&self, record_id: i64) {
        self.in_flight.lock().expect("in-flight lock").remove(&record_id);
    }

    fn depth(&self) -> usize {
        self.items.lock().expect("queue lock").len()
    }

    fn oldest_age(&self) -> Option<Duration> {
        self.items
            .lock()
            .expect("queue lock")
            .front()
            .map(|item| item.enqueued_at.elapsed())
    }
}

/// The delivery queue handle. Cheap to clone; all clones share one queue.
#[derive(Clone)]
pub struct DeliveryQueue {
    inner: Arc<QueueInner>,
}

impl DeliveryQueue {
    pub fn new(
        config: QueueConfig,
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn DeliveryProvider>,
        catalog: Arc<dyn WorkflowCatalog>,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                config,
                store,
                provider,
                catalog,
                items: Mutex::new(VecDeque::new()),
                in_flight: Mutex::new(HashSet::new()),
                active: AtomicUsize::new(0),
                dropped: AtomicU64::new(0),
                paused: AtomicBool::new(false),
                started: AtomicBool::new(false),
                running: AtomicBool::new(false),
                stopping: CancellationToken::new(),
            }),
        }
    }

    /// Enqueue a record for delivery.
    ///
    /// At capacity the item is dropped (never blocks); a record already
    /// queued or in flight is deduplicated by its job key.
    pub fn enqueue(&self, record: &NotificationRecord) -> EnqueueOutcome {
        let outcome = self
            .inner
            .push_initial(QueueItem::initial(record.id, record.enterprise_id.clone()));
        match outcome {
            EnqueueOutcome::Queued => {}
            EnqueueOutcome::Deduplicated => {
                tracing::debug!(record = record.id, "duplicate enqueue deduplicated");
            }
            EnqueueOutcome::Dropped => {
                warn!(
                    record = record.id,
                    capacity = self.inner.config.max_queue_size,
                    "delivery queue full, dropping enqueue"
                );
            }
        }
        outcome
    }

    /// Run the processing loop until stopped, then drain in-flight work.
    ///
    /// Pulls items while `active < max_concurrent`; sleeps `idle_poll_ms`
    /// between iterations when idle, paused, or at capacity. On stop the
    /// loop waits up to `drain_timeout_secs` for in-flight deliveries, then
    /// aborts whatever remains.
    pub async fn run(&self) {
        let inner = Arc::clone(&self.inner);
        inner.started.store(true, Ordering::SeqCst);
        inner.running.store(true, Ordering::SeqCst);
        info!(
            max_concurrent = inner.config.max_concurrent,
            max_queue_size = inner.config.max_queue_size,
            "delivery queue processing loop started"
        );

        let idle = Duration::from_millis(inner.config.idle_poll_ms);
        let mut workers: JoinSet<()> = JoinSet::new();

        while !inner.stopping.is_cancelled() {
            // Reap finished workers so the set stays bounded.
            while workers.try_join_next().is_some() {}

            if let Some(age) = inner.oldest_age() {
                herald_prometheus::set_oldest_queued_age(age.as_secs_f64());
            } else {
                herald_prometheus::set_oldest_queued_age(0.0);
            }

            if inner.paused.load(Ordering::SeqCst)
                || inner.active.load(Ordering::SeqCst) >= inner.config.max_concurrent
            {
                tokio::select! {
                    _ = inner.stopping.cancelled() => break,
                    _ = tokio::time::sleep(idle) => continue,
                }
            }

            let Some(item) = inner.pop() else {
                tokio::select! {
                    _ = inner.stopping.cancelled() => break,
                    _ = tokio::time::sleep(idle) => continue,
                }
            };

            inner.active.fetch_add(1, Ordering::SeqCst);
            herald_prometheus::set_active_deliveries(
                inner.active.load(Ordering::SeqCst) as f64
            );

            let worker_inner = Arc::clone(&inner);
            workers.spawn(async move {
                worker::process_one(worker_inner, item).await;
            });
        }

        let active = inner.active.load(Ordering::SeqCst);
        info!(active, "delivery queue stopping, draining in-flight work");

        let drain = Duration::from_secs(inner.config.drain_timeout_secs);
        let drained = tokio::time::timeout(drain, async {
            while workers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                timeout_secs = inner.config.drain_timeout_secs,
                "drain timeout reached, aborting remaining deliveries"
            );
            workers.shutdown().await;
        }

        inner.running.store(false, Ordering::SeqCst);
        info!("delivery queue stopped");
    }

    /// Stop accepting and processing new items. In-flight work drains
    /// inside [`run`], bounded by the configured timeout.
    pub fn trigger_stop(&self) {
        self.inner.stopping.cancel();
    }

    /// Pause dequeuing. Active deliveries continue to completion.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        info!("delivery queue paused");
    }

    /// Resume dequeuing.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        info!("delivery queue resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Current queue statistics.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            depth: self.inner.depth(),
            active: self.inner.active.load(Ordering::SeqCst),
            dropped: self.inner.dropped.load(Ordering::SeqCst),
            oldest_age: self.inner.oldest_age(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.depth()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::SeqCst)
    }

    /// Current health of the queue.
    ///
    /// Unhealthy when the processing loop is expected to be running but is
    /// not; degraded when depth exceeds 80% of capacity.
    pub fn health(&self) -> HealthStatus {
        let inner = &self.inner;
        if !inner.started.load(Ordering::SeqCst) {
            return HealthStatus::Unhealthy("processing loop not started".into());
        }
        if inner.stopping.is_cancelled() {
            return HealthStatus::Unhealthy("stopped".into());
        }
        if !inner.running.load(Ordering::SeqCst) {
            return HealthStatus::Unhealthy("processing loop exited unexpectedly".into());
        }

        let depth = inner.depth();
        let threshold =
            (inner.config.max_queue_size as f64 * DEPTH_HEALTH_FRACTION) as usize;
        if depth > threshold {
            return HealthStatus::Degraded(format!(
                "queue depth {depth} exceeds 80% of capacity {}",
                inner.config.max_queue_size
            ));
        }

        HealthStatus::Healthy
    }

    /// The spec's boolean health signal.
    pub fn is_healthy(&self) -> bool {
        self.health().is_healthy()
    }
}

#[async_trait]
impl Component for DeliveryQueue {
    fn name(&self) -> &str {
        "delivery-queue"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Queue
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        Ok(self.health())
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        self.trigger_stop();
        Ok(())
    }
}
