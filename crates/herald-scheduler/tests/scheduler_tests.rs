// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producer tests: cron scheduling, one-shot processing, change ingestion.

use std::sync::Arc;
use std::time::Duration;

use herald_config::model::{ListenerConfig, QueueConfig, SchedulerConfig};
use herald_core::types::{
    Channel, NotificationPayload, PublishStatus, Rule, RuleKey, TriggerConfig, TriggerType,
};
use herald_core::{Component, DeliveryProvider, RecordStore};
use herald_queue::DeliveryQueue;
use herald_scheduler::{ChangeListener, CronScheduler, ScheduledProcessor, TickOutcome};
use herald_store::{NewRule, SqliteRecordStore};
use herald_test_utils::{
    open_test_store, publishable_notification, MockCatalog, MockProvider, SlowStore,
};

fn idle_queue(store: Arc<dyn RecordStore>) -> DeliveryQueue {
    // A queue whose loop is never started: producers only push into it,
    // and tests observe the queued depth directly.
    DeliveryQueue::new(
        QueueConfig::default(),
        store,
        Arc::new(MockProvider::new()) as Arc<dyn DeliveryProvider>,
        Arc::new(MockCatalog::with(["daily-digest", "welcome"])),
    )
}

fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig::default()
}

fn cron_rule(id: i64, expression: &str) -> Rule {
    Rule {
        id,
        enterprise_id: "acme".into(),
        trigger_type: TriggerType::Cron,
        trigger: TriggerConfig {
            cron_expression: expression.into(),
            timezone: None,
            enabled: true,
        },
        workflow_key: "daily-digest".into(),
        payload_template: serde_json::json!({"kind": "message", "body": "digest"}),
        recipients: vec![uuid::Uuid::new_v4().to_string()],
        channels: vec![Channel::Email],
        publish_status: PublishStatus::Publish,
        deactivated: false,
        last_executed_at: None,
    }
}

fn stored_rule(expression: &str, publish: PublishStatus) -> NewRule {
    NewRule {
        enterprise_id: "acme".into(),
        cron_expression: expression.into(),
        timezone: None,
        enabled: true,
        workflow_key: "daily-digest".into(),
        payload_template: serde_json::json!({"kind": "message", "body": "digest"}),
        recipients: vec![uuid::Uuid::new_v4().to_string()],
        channels: vec![Channel::Email],
        publish_status: publish,
    }
}

async fn wait_for_queue_depth(queue: &DeliveryQueue, depth: usize, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while queue.len() < depth {
        assert!(
            tokio::time::Instant::now() < deadline,
            "queue never reached depth {depth} (currently {})",
            queue.len()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// --- Cron scheduler ---

#[tokio::test]
async fn invalid_cron_expression_is_a_hard_schedule_error() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let scheduler = CronScheduler::new(&scheduler_config(), store, queue);

    let err = scheduler
        .schedule(&cron_rule(1, "not a cron"))
        .unwrap_err();
    assert!(err.to_string().contains("invalid cron expression"));
    assert_eq!(scheduler.counts().active, 0);
}

#[tokio::test]
async fn unknown_timezone_is_a_hard_schedule_error() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let scheduler = CronScheduler::new(&scheduler_config(), store, queue);

    let mut rule = cron_rule(1, "0 9 * * *");
    rule.trigger.timezone = Some("Mars/Olympus_Mons".into());
    let err = scheduler.schedule(&rule).unwrap_err();
    assert!(err.to_string().contains("unknown timezone"));
}

#[tokio::test]
async fn scheduling_is_idempotent() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let scheduler = CronScheduler::new(&scheduler_config(), store, queue);

    let rule = cron_rule(1, "0 9 * * *");
    scheduler.schedule(&rule).unwrap();
    scheduler.schedule(&rule).unwrap();
    assert_eq!(scheduler.counts().active, 1);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn unschedule_removes_the_timer() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let scheduler = CronScheduler::new(&scheduler_config(), store, queue);

    scheduler.schedule(&cron_rule(7, "0 9 * * *")).unwrap();
    assert!(scheduler.unschedule(&RuleKey::new("acme", 7)));
    assert_eq!(scheduler.counts().active, 0);
    assert!(!scheduler.unschedule(&RuleKey::new("acme", 7)));
}

#[tokio::test]
async fn reload_schedules_eligible_rules_and_counts_failures() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let scheduler = CronScheduler::new(&scheduler_config(), store.clone(), queue);

    store
        .insert_rule(&stored_rule("0 9 * * *", PublishStatus::Publish))
        .await
        .unwrap();
    store
        .insert_rule(&stored_rule("0 9 * * *", PublishStatus::Draft))
        .await
        .unwrap();
    store
        .insert_rule(&stored_rule("61 99 * * *", PublishStatus::Publish))
        .await
        .unwrap();

    scheduler.reload().await.unwrap();

    let counts = scheduler.counts();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.active, 1, "only the valid published rule schedules");
    assert_eq!(counts.failed, 1, "the invalid expression fails alone");
    assert_eq!(counts.reconnecting, 0);

    // A failed rule degrades health but the others keep running.
    let health = herald_core::Component::health_check(&scheduler).await.unwrap();
    assert!(matches!(health, herald_core::HealthStatus::Degraded(_)));

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn every_second_rule_fires_and_enqueues() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let scheduler = CronScheduler::new(&scheduler_config(), store.clone(), queue.clone());

    let rule_id = store
        .insert_rule(&stored_rule("* * * * * *", PublishStatus::Publish))
        .await
        .unwrap();
    scheduler.reload().await.unwrap();

    wait_for_queue_depth(&queue, 1, Duration::from_secs(3)).await;

    let rules = store.list_cron_rules().await.unwrap();
    let fired = rules.iter().find(|r| r.id == rule_id).unwrap();
    assert!(fired.last_executed_at.is_some(), "bookkeeping must record the fire");

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn overlapping_fires_are_skipped() {
    let (store, _dir) = open_test_store().await;
    // Inserting the materialized record takes 2s, so an every-second rule
    // is guaranteed to tick while the previous fire still runs.
    let slow: Arc<dyn RecordStore> =
        Arc::new(SlowStore::new(store.clone(), Duration::from_secs(2)));
    let queue = idle_queue(slow.clone());
    let scheduler = CronScheduler::new(&scheduler_config(), slow, queue);

    scheduler.schedule(&cron_rule(1, "* * * * * *")).unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert!(
        scheduler.overlap_skips() >= 1,
        "fires during a running execution must be skipped, got {}",
        scheduler.overlap_skips()
    );

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_all_timers() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let scheduler = CronScheduler::new(&scheduler_config(), store, queue.clone());

    scheduler.schedule(&cron_rule(1, "* * * * * *")).unwrap();
    scheduler.shutdown().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2200)).await;
    assert_eq!(queue.len(), 0, "no fires after shutdown");
}

// --- One-shot scheduled processor ---

#[tokio::test]
async fn tick_enqueues_due_records() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let processor = ScheduledProcessor::new(&scheduler_config(), store.clone(), queue.clone());

    let mut due = publishable_notification("welcome");
    due.scheduled_for = Some(chrono::Utc::now() - chrono::Duration::minutes(1));
    store.insert_record(&due).await.unwrap();

    let outcome = processor.tick().await.unwrap();
    assert_eq!(outcome, TickOutcome::Ran { enqueued: 1, armed: 0 });
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn tick_respects_batch_size() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let mut config = scheduler_config();
    config.batch_size = 2;
    let processor = ScheduledProcessor::new(&config, store.clone(), queue.clone());

    for minutes in 1..=3 {
        let mut due = publishable_notification("welcome");
        due.scheduled_for = Some(chrono::Utc::now() - chrono::Duration::minutes(minutes));
        store.insert_record(&due).await.unwrap();
    }

    let outcome = processor.tick().await.unwrap();
    assert_eq!(outcome, TickOutcome::Ran { enqueued: 2, armed: 0 });

    // The remaining record is picked up by the next tick.
    let outcome = processor.tick().await.unwrap();
    assert_eq!(outcome, TickOutcome::Ran { enqueued: 1, armed: 0 });
}

#[tokio::test]
async fn overlapping_ticks_are_skipped_not_queued() {
    let (store, _dir) = open_test_store().await;
    let slow: Arc<dyn RecordStore> =
        Arc::new(SlowStore::new(store.clone(), Duration::from_millis(500)));
    let queue = idle_queue(slow.clone());
    let processor = ScheduledProcessor::new(&scheduler_config(), slow, queue);

    let first = processor.clone();
    let running = tokio::spawn(async move { first.tick().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let outcome = processor.tick().await.unwrap();
    assert_eq!(outcome, TickOutcome::SkippedOverlap);

    assert!(matches!(
        running.await.unwrap().unwrap(),
        TickOutcome::Ran { .. }
    ));
}

#[tokio::test]
async fn short_horizon_records_get_a_delayed_enqueue() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let processor = ScheduledProcessor::new(&scheduler_config(), store.clone(), queue.clone());

    let mut soon = publishable_notification("welcome");
    soon.scheduled_for = Some(chrono::Utc::now() + chrono::Duration::milliseconds(300));
    store.insert_record(&soon).await.unwrap();

    let outcome = processor.tick().await.unwrap();
    assert_eq!(outcome, TickOutcome::Ran { enqueued: 0, armed: 1 });
    assert_eq!(processor.armed_count(), 1);
    assert_eq!(queue.len(), 0, "not due yet");

    // A second tick must not re-arm the same record.
    let outcome = processor.tick().await.unwrap();
    assert_eq!(outcome, TickOutcome::Ran { enqueued: 0, armed: 0 });

    // Once due, the armed task enqueues without another poll tick.
    wait_for_queue_depth(&queue, 1, Duration::from_secs(2)).await;
    assert_eq!(processor.armed_count(), 0);
}

#[tokio::test]
async fn paused_processor_skips_ticks() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let processor = ScheduledProcessor::new(&scheduler_config(), store.clone(), queue);

    processor.pause();
    assert_eq!(processor.tick().await.unwrap(), TickOutcome::SkippedPaused);

    processor.resume();
    assert!(matches!(
        processor.tick().await.unwrap(),
        TickOutcome::Ran { .. }
    ));
}

// --- Change ingestion listener ---

async fn start_listener(
    config: ListenerConfig,
    store: Arc<SqliteRecordStore>,
    queue: DeliveryQueue,
) -> (ChangeListener, tokio::task::JoinHandle<()>) {
    let listener = ChangeListener::new(&config, store as Arc<dyn RecordStore>, queue);
    let run = listener.clone();
    let handle = tokio::spawn(async move { run.run().await });
    // Let the subscription attach before any inserts happen.
    tokio::time::sleep(Duration::from_millis(50)).await;
    (listener, handle)
}

#[tokio::test]
async fn inserted_record_is_enqueued() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let (listener, handle) =
        start_listener(ListenerConfig::default(), store.clone(), queue.clone()).await;

    store
        .insert_record(&publishable_notification("welcome"))
        .await
        .unwrap();

    wait_for_queue_depth(&queue, 1, Duration::from_secs(2)).await;

    listener.shutdown().await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn tenant_filter_drops_foreign_inserts() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let config = ListenerConfig {
        enterprise_id: Some("acme".into()),
        ..ListenerConfig::default()
    };
    let (listener, handle) = start_listener(config, store.clone(), queue.clone()).await;

    let mut foreign = publishable_notification("welcome");
    foreign.enterprise_id = "globex".into();
    store.insert_record(&foreign).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(queue.len(), 0, "foreign-tenant inserts are ignored");

    // A matching-tenant insert still flows through.
    store
        .insert_record(&publishable_notification("welcome"))
        .await
        .unwrap();
    wait_for_queue_depth(&queue, 1, Duration::from_secs(2)).await;

    listener.shutdown().await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn future_scheduled_inserts_are_left_to_the_processor() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let (listener, handle) =
        start_listener(ListenerConfig::default(), store.clone(), queue.clone()).await;

    let mut scheduled = publishable_notification("welcome");
    scheduled.scheduled_for = Some(chrono::Utc::now() + chrono::Duration::hours(2));
    store.insert_record(&scheduled).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(queue.len(), 0);

    listener.shutdown().await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn draft_inserts_are_not_enqueued() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let (listener, handle) =
        start_listener(ListenerConfig::default(), store.clone(), queue.clone()).await;

    let mut draft = publishable_notification("welcome");
    draft.publish_status = PublishStatus::Draft;
    store.insert_record(&draft).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(queue.len(), 0);

    listener.shutdown().await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn shutdown_tears_down_the_subscription() {
    let (store, _dir) = open_test_store().await;
    let queue = idle_queue(store.clone());
    let (listener, handle) =
        start_listener(ListenerConfig::default(), store.clone(), queue.clone()).await;

    listener.shutdown().await.unwrap();
    handle.await.unwrap();

    // Events after shutdown are not delivered anywhere.
    store
        .insert_record(&publishable_notification("welcome"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(queue.len(), 0);
}
