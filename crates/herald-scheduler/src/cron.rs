// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cron rule scheduler.
//!
//! One timer task per schedulable rule, keyed by [`RuleKey`]. Each task is
//! an explicit loop: compute the next occurrence, sleep until it (or until
//! cancelled), fire. A fire that would overlap the rule's previous still-
//! running fire is skipped and counted, never queued behind it.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use croner::Cron;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use herald_config::model::SchedulerConfig;
use herald_core::types::{
    ComponentKind, HealthStatus, NewNotification, NotificationPayload, PublishStatus, Rule,
    RuleKey,
};
use herald_core::validate::validate_notification;
use herald_core::{Component, HeraldError, RecordStore};
use herald_queue::DeliveryQueue;

/// Schedule counts for the `/health/subscriptions` surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleCounts {
    pub total: usize,
    pub active: usize,
    pub failed: usize,
    pub reconnecting: usize,
}

/// A running timer and its parsed schedule, owned by the scheduler.
struct CronJob {
    token: CancellationToken,
    cron_expression: String,
    timezone: Option<String>,
}

struct CronInner {
    store: Arc<dyn RecordStore>,
    queue: DeliveryQueue,
    default_timezone: String,
    jobs: Mutex<HashMap<RuleKey, CronJob>>,
    /// Rules that failed validation at schedule time, per the last reload.
    failed: Mutex<HashSet<RuleKey>>,
    /// Cron rules seen in the last reload, schedulable or not.
    total_rules: AtomicUsize,
    overlap_skips: AtomicU64,
    paused: AtomicBool,
    stopping: CancellationToken,
}

/// Maintains one recurring timer per active cron rule.
#[derive(Clone)]
pub struct CronScheduler {
    inner: Arc<CronInner>,
}

impl CronScheduler {
    pub fn new(
        config: &SchedulerConfig,
        store: Arc<dyn RecordStore>,
        queue: DeliveryQueue,
    ) -> Self {
        Self {
            inner: Arc::new(CronInner {
                store,
                queue,
                default_timezone: config.default_timezone.clone(),
                jobs: Mutex::new(HashMap::new()),
                failed: Mutex::new(HashSet::new()),
                total_rules: AtomicUsize::new(0),
                overlap_skips: AtomicU64::new(0),
                paused: AtomicBool::new(false),
                stopping: CancellationToken::new(),
            }),
        }
    }

    /// Load all cron rules and reconcile the running timers against them.
    ///
    /// Schedulable rules get a timer (idempotent for unchanged config, a
    /// fresh timer when the trigger config changed); rules that became
    /// ineligible or disappeared are unscheduled. A rule with an invalid
    /// trigger config fails alone, never aborting the rest.
    pub async fn reload(&self) -> Result<(), HeraldError> {
        let rules = self.inner.store.list_cron_rules().await?;
        self.inner.total_rules.store(rules.len(), Ordering::SeqCst);

        let mut seen = HashSet::new();
        for rule in rules {
            let key = RuleKey::new(rule.enterprise_id.clone(), rule.id);
            seen.insert(key.clone());

            if !rule.is_schedulable() {
                if self.unschedule(&key) {
                    info!(rule = %key, "rule no longer eligible, unscheduled");
                }
                self.inner.failed.lock().expect("failed lock").remove(&key);
                continue;
            }

            let needs_reschedule = {
                let jobs = self.inner.jobs.lock().expect("jobs lock");
                jobs.get(&key).is_some_and(|job| {
                    job.cron_expression != rule.trigger.cron_expression
                        || job.timezone != rule.trigger.timezone
                })
            };
            if needs_reschedule {
                self.unschedule(&key);
            }

            if let Err(e) = self.schedule(&rule) {
                warn!(rule = %key, error = %e, "rule failed to schedule");
                self.inner.failed.lock().expect("failed lock").insert(key);
            } else {
                self.inner.failed.lock().expect("failed lock").remove(&key);
            }
        }

        // Drop timers for rules that disappeared entirely.
        let stale: Vec<RuleKey> = {
            let jobs = self.inner.jobs.lock().expect("jobs lock");
            jobs.keys().filter(|k| !seen.contains(k)).cloned().collect()
        };
        for key in stale {
            self.unschedule(&key);
            info!(rule = %key, "rule removed, unscheduled");
        }

        self.update_gauge();
        Ok(())
    }

    /// Schedule one rule. A no-op if the rule is already scheduled.
    ///
    /// An invalid cron expression or unknown timezone is a hard error for
    /// this rule, raised here rather than silently ignored.
    pub fn schedule(&self, rule: &Rule) -> Result<(), HeraldError> {
        let key = RuleKey::new(rule.enterprise_id.clone(), rule.id);
        {
            let jobs = self.inner.jobs.lock().expect("jobs lock");
            if jobs.contains_key(&key) {
                debug!(rule = %key, "already scheduled, ignoring");
                return Ok(());
            }
        }

        let tz_name = rule
            .trigger
            .timezone
            .as_deref()
            .unwrap_or(&self.inner.default_timezone);
        let tz = Tz::from_str(tz_name).map_err(|_| HeraldError::Schedule {
            rule: key.to_string(),
            message: format!("unknown timezone `{tz_name}`"),
        })?;

        let cron = Cron::new(&rule.trigger.cron_expression)
            .with_seconds_optional()
            .parse()
            .map_err(|e| HeraldError::Schedule {
                rule: key.to_string(),
                message: format!(
                    "invalid cron expression `{}`: {e}",
                    rule.trigger.cron_expression
                ),
            })?;

        let token = self.inner.stopping.child_token();
        let job = CronJob {
            token: token.clone(),
            cron_expression: rule.trigger.cron_expression.clone(),
            timezone: rule.trigger.timezone.clone(),
        };

        let loop_inner = Arc::clone(&self.inner);
        let loop_rule = rule.clone();
        let loop_key = key.clone();
        tokio::spawn(async move {
            timer_loop(loop_inner, loop_rule, loop_key, cron, tz, token).await;
        });

        self.inner.jobs.lock().expect("jobs lock").insert(key.clone(), job);
        self.update_gauge();
        info!(
            rule = %key,
            cron = %rule.trigger.cron_expression,
            timezone = tz_name,
            "rule scheduled"
        );
        Ok(())
    }

    /// Stop and remove the timer for a rule. Records already enqueued are
    /// unaffected. Returns whether a timer existed.
    pub fn unschedule(&self, key: &RuleKey) -> bool {
        let removed = self.inner.jobs.lock().expect("jobs lock").remove(key);
        let existed = removed.is_some();
        if let Some(job) = removed {
            job.token.cancel();
            debug!(rule = %key, "rule unscheduled");
        }
        self.update_gauge();
        existed
    }

    /// Replace a rule's timer with one built from its current config.
    ///
    /// Always a full unschedule + schedule so no timer closure can capture
    /// stale configuration.
    pub fn reschedule(&self, rule: &Rule) -> Result<(), HeraldError> {
        let key = RuleKey::new(rule.enterprise_id.clone(), rule.id);
        self.unschedule(&key);
        self.schedule(rule)
    }

    /// Stop producing fires without cancelling the timers.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        info!("cron scheduler paused");
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        info!("cron scheduler resumed");
    }

    /// Schedule counts for the subscriptions health surface.
    pub fn counts(&self) -> ScheduleCounts {
        ScheduleCounts {
            total: self.inner.total_rules.load(Ordering::SeqCst),
            active: self.inner.jobs.lock().expect("jobs lock").len(),
            failed: self.inner.failed.lock().expect("failed lock").len(),
            reconnecting: 0,
        }
    }

    /// Fires skipped because the previous fire was still executing.
    pub fn overlap_skips(&self) -> u64 {
        self.inner.overlap_skips.load(Ordering::SeqCst)
    }

    fn update_gauge(&self) {
        let active = self.inner.jobs.lock().expect("jobs lock").len();
        herald_prometheus::set_schedules_active(active as f64);
    }
}

#[async_trait]
impl Component for CronScheduler {
    fn name(&self) -> &str {
        "cron-scheduler"
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
        let failed = self.inner.failed.lock().expect("failed lock").len();
        if failed > 0 {
            return Ok(HealthStatus::Degraded(format!(
                "{failed} rules failed to schedule"
            )));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        self.inner.stopping.cancel();
        self.inner.jobs.lock().expect("jobs lock").clear();
        self.update_gauge();
        Ok(())
    }
}

/// The per-rule timer loop. Fires are spawned so the loop keeps ticking on
/// schedule; the per-rule running flag enforces non-overlap.
async fn timer_loop(
    inner: Arc<CronInner>,
    rule: Rule,
    key: RuleKey,
    cron: Cron,
    tz: Tz,
    token: CancellationToken,
) {
    debug!(rule = %key, "cron timer loop started");
    let running = Arc::new(AtomicBool::new(false));

    loop {
        let now = Utc::now().with_timezone(&tz);
        let next = match cron.find_next_occurrence(&now, false) {
            Ok(next) => next,
            Err(e) => {
                error!(rule = %key, error = %e, "no next occurrence, stopping timer");
                break;
            }
        };
        let delay = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        if inner.paused.load(Ordering::SeqCst) {
            debug!(rule = %key, "scheduler paused, skipping fire");
            continue;
        }

        if running.swap(true, Ordering::SeqCst) {
            inner.overlap_skips.fetch_add(1, Ordering::SeqCst);
            herald_prometheus::record_cron_overlap_skip();
            warn!(rule = %key, "previous fire still executing, skipping this fire");
            continue;
        }

        let fire_inner = Arc::clone(&inner);
        let fire_rule = rule.clone();
        let fire_key = key.clone();
        let fire_running = Arc::clone(&running);
        tokio::spawn(async move {
            fire(fire_inner, fire_rule, &fire_key).await;
            fire_running.store(false, Ordering::SeqCst);
        });
    }

    debug!(rule = %key, "cron timer loop stopped");
}

/// Materialize a notification record from the rule and enqueue it.
async fn fire(inner: Arc<CronInner>, rule: Rule, key: &RuleKey) {
    herald_prometheus::record_cron_fire(&rule.enterprise_id);

    let payload: NotificationPayload = match serde_json::from_value(rule.payload_template.clone())
    {
        Ok(payload) => payload,
        Err(e) => {
            error!(rule = %key, error = %e, "payload template does not materialize, skipping fire");
            return;
        }
    };

    let new = NewNotification {
        transaction_uuid: None,
        enterprise_id: rule.enterprise_id.clone(),
        business_id: None,
        workflow_key: rule.workflow_key.clone(),
        payload,
        recipients: rule.recipients.clone(),
        channels: rule.channels.clone(),
        overrides: None,
        publish_status: PublishStatus::Publish,
        scheduled_for: None,
    };
    if let Err(e) = validate_notification(&new) {
        error!(rule = %key, error = %e, "materialized notification is invalid, skipping fire");
        return;
    }

    let id = match inner.store.insert_record(&new).await {
        Ok(id) => id,
        Err(e) => {
            error!(rule = %key, error = %e, "failed to persist materialized record");
            return;
        }
    };

    if let Err(e) = inner.store.touch_rule_executed(rule.id, Utc::now()).await {
        warn!(rule = %key, error = %e, "failed to record rule execution");
    }

    match inner.store.fetch_record(id).await {
        Ok(Some(record)) => {
            inner.queue.enqueue(&record);
            info!(rule = %key, record = id, "cron fire enqueued notification");
        }
        Ok(None) => warn!(rule = %key, record = id, "materialized record vanished"),
        Err(e) => error!(rule = %key, record = id, error = %e, "failed to fetch materialized record"),
    }
}
