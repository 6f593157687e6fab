// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The orchestrator: starts, health-checks, pauses, and stops the
//! delivery pipeline as a coordinated unit.
//!
//! State machine: `Stopped -> Starting -> Running -> Stopping -> Stopped`,
//! with a degraded observable sub-state while running. Shutdown never
//! aborts early on a child failure; every child is shut down and all
//! errors are collected and logged.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use herald_config::model::HeraldConfig;
use herald_core::types::HealthStatus;
use herald_core::{Component, DeliveryProvider, HeraldError, RecordStore, WorkflowCatalog};
use herald_queue::{DeliveryQueue, QueueStats};
use herald_scheduler::{ChangeListener, CronScheduler, ScheduleCounts, ScheduledProcessor};

/// Supervisor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Health of one supervised component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
}

/// Aggregate health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub state: SupervisorState,
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub checked_at: DateTime<Utc>,
}

/// Shared service clients, constructed once at process start and passed
/// by handle to every component that needs them.
#[derive(Clone)]
pub struct ServiceHandles {
    pub store: Arc<dyn RecordStore>,
    pub provider: Arc<dyn DeliveryProvider>,
    pub catalog: Arc<dyn WorkflowCatalog>,
}

/// Everything built by one `start()` and torn down by one `stop()`.
struct Children {
    queue: DeliveryQueue,
    listener: ChangeListener,
    cron: CronScheduler,
    processor: ScheduledProcessor,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    token: CancellationToken,
}

struct SupervisorInner {
    config: HeraldConfig,
    handles: ServiceHandles,
    state: Mutex<SupervisorState>,
    started_at: Mutex<Option<Instant>>,
    children: Mutex<Option<Children>>,
    health: Mutex<Option<HealthReport>>,
    paused: Mutex<bool>,
}

/// The pipeline supervisor. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

impl Supervisor {
    pub fn new(config: HeraldConfig, handles: ServiceHandles) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                config,
                handles,
                state: Mutex::new(SupervisorState::Stopped),
                started_at: Mutex::new(None),
                children: Mutex::new(None),
                health: Mutex::new(None),
                paused: Mutex::new(false),
            }),
        }
    }

    pub fn state(&self) -> SupervisorState {
        *self.inner.state.lock().expect("state lock")
    }

    fn set_state(&self, next: SupervisorState) {
        let mut state = self.inner.state.lock().expect("state lock");
        info!(from = %*state, to = %next, "supervisor state transition");
        *state = next;
    }

    /// Seconds since the last successful start.
    pub fn uptime(&self) -> Duration {
        self.inner
            .started_at
            .lock()
            .expect("uptime lock")
            .map(|at| at.elapsed())
            .unwrap_or_default()
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.lock().expect("paused lock")
    }

    /// Start all children in dependency order: queue loop first (the
    /// consumer), then the producers, then the health loop.
    pub async fn start(&self) -> Result<(), HeraldError> {
        if self.state() != SupervisorState::Stopped {
            return Err(HeraldError::Internal(format!(
                "cannot start from state {}",
                self.state()
            )));
        }
        self.set_state(SupervisorState::Starting);

        let config = &self.inner.config;
        let handles = &self.inner.handles;
        let token = CancellationToken::new();
        let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        let queue = DeliveryQueue::new(
            config.queue.clone(),
            Arc::clone(&handles.store),
            Arc::clone(&handles.provider),
            Arc::clone(&handles.catalog),
        );
        {
            let queue = queue.clone();
            tasks.push(("delivery-queue", tokio::spawn(async move { queue.run().await })));
        }

        let listener = ChangeListener::new(
            &config.listener,
            Arc::clone(&handles.store),
            queue.clone(),
        );
        {
            let listener = listener.clone();
            tasks.push((
                "change-listener",
                tokio::spawn(async move { listener.run().await }),
            ));
        }

        let cron = CronScheduler::new(&config.scheduler, Arc::clone(&handles.store), queue.clone());
        // A store failure here is an unrecoverable startup failure; an
        // individual bad rule is not (it is counted, logged, and skipped).
        if let Err(e) = cron.reload().await {
            self.set_state(SupervisorState::Stopped);
            for (_, task) in tasks {
                task.abort();
            }
            return Err(e);
        }

        let processor = ScheduledProcessor::new(
            &config.scheduler,
            Arc::clone(&handles.store),
            queue.clone(),
        );
        {
            let processor = processor.clone();
            tasks.push((
                "scheduled-processor",
                tokio::spawn(async move { processor.run().await }),
            ));
        }

        // Health aggregation loop.
        {
            let supervisor = self.clone();
            let interval = Duration::from_secs(config.supervisor.health_interval_secs);
            let health_token = token.clone();
            tasks.push((
                "health-loop",
                tokio::spawn(async move {
                    loop {
                        let report = supervisor.check_health().await;
                        *supervisor.inner.health.lock().expect("health lock") = Some(report);
                        tokio::select! {
                            _ = health_token.cancelled() => break,
                            _ = tokio::time::sleep(interval) => {}
                        }
                    }
                }),
            ));
        }

        *self.inner.children.lock().expect("children lock") = Some(Children {
            queue,
            listener,
            cron,
            processor,
            tasks,
            token,
        });
        *self.inner.started_at.lock().expect("uptime lock") = Some(Instant::now());
        *self.inner.paused.lock().expect("paused lock") = false;
        self.set_state(SupervisorState::Running);
        info!("supervisor started");
        Ok(())
    }

    /// Stop the pipeline: stop producers, drain the queue (bounded), then
    /// shut down every child even if some error. All child shutdown
    /// errors are collected and logged; stop always completes.
    pub async fn stop(&self) -> Vec<HeraldError> {
        let mut errors = Vec::new();

        let children = {
            let mut slot = self.inner.children.lock().expect("children lock");
            slot.take()
        };
        let Some(children) = children else {
            return errors;
        };

        self.set_state(SupervisorState::Stopping);

        // (a) Stop accepting new items: producers go down first.
        if let Err(e) = children.listener.shutdown().await {
            error!(error = %e, "listener shutdown error");
            errors.push(e);
        }
        if let Err(e) = children.cron.shutdown().await {
            error!(error = %e, "cron scheduler shutdown error");
            errors.push(e);
        }
        if let Err(e) = children.processor.shutdown().await {
            error!(error = %e, "scheduled processor shutdown error");
            errors.push(e);
        }

        // (b) Drain active deliveries, bounded by the stop timeout; the
        // queue aborts leftovers itself after its drain window.
        children.queue.trigger_stop();
        children.token.cancel();

        let timeout = Duration::from_secs(self.inner.config.supervisor.stop_timeout_secs);
        for (name, mut task) in children.tasks {
            match tokio::time::timeout(timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => {
                    error!(task = name, error = %e, "child task ended abnormally");
                    errors.push(HeraldError::Internal(format!(
                        "{name} task ended abnormally: {e}"
                    )));
                }
                Err(_) => {
                    // (c) Force-proceed after the timeout.
                    warn!(task = name, "child task did not stop in time, aborting");
                    task.abort();
                    errors.push(HeraldError::Timeout { duration: timeout });
                }
            }
        }

        // (d) Shut down shared resources; failures are collected, never
        // allowed to abort the remaining shutdown steps.
        if let Err(e) = self.inner.handles.provider.shutdown().await {
            error!(error = %e, "provider shutdown error");
            errors.push(e);
        }
        if let Err(e) = self.inner.handles.store.shutdown().await {
            error!(error = %e, "store shutdown error");
            errors.push(e);
        }

        *self.inner.started_at.lock().expect("uptime lock") = None;
        self.set_state(SupervisorState::Stopped);
        if errors.is_empty() {
            info!("supervisor stopped cleanly");
        } else {
            warn!(errors = errors.len(), "supervisor stopped with child errors");
        }
        errors
    }

    /// Stop new-item production without killing in-flight work.
    pub fn pause(&self) {
        let children = self.inner.children.lock().expect("children lock");
        if let Some(children) = children.as_ref() {
            children.queue.pause();
            children.listener.pause();
            children.cron.pause();
            children.processor.pause();
        }
        *self.inner.paused.lock().expect("paused lock") = true;
        info!("pipeline paused");
    }

    pub fn resume(&self) {
        let children = self.inner.children.lock().expect("children lock");
        if let Some(children) = children.as_ref() {
            children.queue.resume();
            children.listener.resume();
            children.cron.resume();
            children.processor.resume();
        }
        *self.inner.paused.lock().expect("paused lock") = false;
        info!("pipeline resumed");
    }

    /// Force a reconciliation pass: reload cron rules and run one
    /// scheduled-processor tick.
    pub async fn reconcile(&self) -> Result<(), HeraldError> {
        let (cron, processor) = {
            let children = self.inner.children.lock().expect("children lock");
            let Some(children) = children.as_ref() else {
                return Err(HeraldError::Internal("supervisor is not running".into()));
            };
            (children.cron.clone(), children.processor.clone())
        };
        cron.reload().await?;
        processor.tick().await?;
        info!("forced reconciliation complete");
        Ok(())
    }

    /// Compute a fresh aggregate health report from every child.
    pub async fn check_health(&self) -> HealthReport {
        let state = self.state();
        let mut components = Vec::new();

        async fn check<C: Component + ?Sized>(target: &C) -> HealthStatus {
            match target.health_check().await {
                Ok(status) => status,
                Err(e) => HealthStatus::Unhealthy(format!("health check failed: {e}")),
            }
        }

        components.push(ComponentHealth {
            name: self.inner.handles.store.name().to_string(),
            status: check(self.inner.handles.store.as_ref()).await,
        });
        components.push(ComponentHealth {
            name: self.inner.handles.provider.name().to_string(),
            status: check(self.inner.handles.provider.as_ref()).await,
        });

        let children_handles = {
            let children = self.inner.children.lock().expect("children lock");
            children.as_ref().map(|c| {
                (
                    c.queue.clone(),
                    c.listener.clone(),
                    c.cron.clone(),
                    c.processor.clone(),
                )
            })
        };
        if let Some((queue, listener, cron, processor)) = children_handles {
            components.push(ComponentHealth {
                name: queue.name().to_string(),
                status: check(&queue).await,
            });
            components.push(ComponentHealth {
                name: listener.name().to_string(),
                status: check(&listener).await,
            });
            components.push(ComponentHealth {
                name: cron.name().to_string(),
                status: check(&cron).await,
            });
            components.push(ComponentHealth {
                name: processor.name().to_string(),
                status: check(&processor).await,
            });
        }

        let status = aggregate(state, &components);
        HealthReport {
            state,
            status,
            components,
            checked_at: Utc::now(),
        }
    }

    /// The most recent health snapshot, or a fresh "stopped" report when
    /// the health loop has not run yet.
    pub fn health(&self) -> HealthReport {
        self.inner
            .health
            .lock()
            .expect("health lock")
            .clone()
            .unwrap_or(HealthReport {
                state: self.state(),
                status: HealthStatus::Unhealthy("not started".into()),
                components: Vec::new(),
                checked_at: Utc::now(),
            })
    }

    /// Queue statistics, when running.
    pub fn queue_stats(&self) -> Option<QueueStats> {
        let children = self.inner.children.lock().expect("children lock");
        children.as_ref().map(|c| c.queue.stats())
    }

    /// Recurring-schedule counts for the subscriptions surface.
    pub fn subscription_counts(&self) -> ScheduleCounts {
        let children = self.inner.children.lock().expect("children lock");
        children.as_ref().map(|c| c.cron.counts()).unwrap_or(ScheduleCounts {
            total: 0,
            active: 0,
            failed: 0,
            reconnecting: 0,
        })
    }

    /// Supervision loop: start the children, then restart them on a fixed
    /// recycle period until the shutdown token fires. The periodic restart
    /// bounds the growth of any long-running execution state, the way a
    /// durably-scheduled coordinator "continues as new".
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), HeraldError> {
        let recycle =
            Duration::from_secs(self.inner.config.supervisor.recycle_interval_hours * 3600);

        loop {
            // The control surface may have stopped or started the pipeline
            // between wakeups; only start from a stopped state.
            if self.state() == SupervisorState::Stopped {
                self.start().await?;
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested");
                    self.stop().await;
                    return Ok(());
                }
                _ = tokio::time::sleep(recycle) => {
                    if self.state() == SupervisorState::Running {
                        info!(
                            hours = self.inner.config.supervisor.recycle_interval_hours,
                            "recycle interval reached, restarting children"
                        );
                        self.stop().await;
                    }
                }
            }
        }
    }
}

/// Collapse per-component health into the aggregate status.
///
/// A dead store is unhealthy (nothing can progress); any other child
/// problem is the degraded sub-state while the process itself is alive.
fn aggregate(state: SupervisorState, components: &[ComponentHealth]) -> HealthStatus {
    if state != SupervisorState::Running {
        return HealthStatus::Unhealthy(format!("supervisor is {state}"));
    }

    let mut reasons = Vec::new();
    for component in components {
        match &component.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                reasons.push(format!("{}: {reason}", component.name));
            }
            HealthStatus::Unhealthy(reason) => {
                if component.name == "sqlite-store" || component.name.ends_with("store") {
                    return HealthStatus::Unhealthy(format!("{}: {reason}", component.name));
                }
                reasons.push(format!("{}: {reason}", component.name));
            }
        }
    }

    if reasons.is_empty() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded(reasons.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_requires_running_state() {
        let status = aggregate(SupervisorState::Stopped, &[]);
        assert!(matches!(status, HealthStatus::Unhealthy(_)));
    }

    #[test]
    fn aggregate_healthy_when_all_children_healthy() {
        let components = vec![
            ComponentHealth {
                name: "sqlite-store".into(),
                status: HealthStatus::Healthy,
            },
            ComponentHealth {
                name: "delivery-queue".into(),
                status: HealthStatus::Healthy,
            },
        ];
        assert_eq!(
            aggregate(SupervisorState::Running, &components),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn aggregate_degrades_on_child_problems() {
        let components = vec![ComponentHealth {
            name: "delivery-queue".into(),
            status: HealthStatus::Degraded("queue depth 9 exceeds 80% of capacity 10".into()),
        }];
        match aggregate(SupervisorState::Running, &components) {
            HealthStatus::Degraded(reason) => assert!(reason.contains("delivery-queue")),
            other => panic!("expected Degraded, got {other:?}"),
        }
    }

    #[test]
    fn aggregate_unhealthy_when_store_is_down() {
        let components = vec![ComponentHealth {
            name: "sqlite-store".into(),
            status: HealthStatus::Unhealthy("connection lost".into()),
        }];
        assert!(matches!(
            aggregate(SupervisorState::Running, &components),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[test]
    fn state_labels_are_snake_case() {
        assert_eq!(SupervisorState::Stopped.to_string(), "stopped");
        assert_eq!(SupervisorState::Starting.to_string(), "starting");
        assert_eq!(SupervisorState::Running.to_string(), "running");
        assert_eq!(SupervisorState::Stopping.to_string(), "stopping");
    }
}
