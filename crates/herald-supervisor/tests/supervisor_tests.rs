// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervisor lifecycle tests over the real store and mock provider.

use std::sync::Arc;
use std::time::Duration;

use herald_config::model::HeraldConfig;
use herald_core::types::{HealthStatus, NotificationStatus};
use herald_core::RecordStore;
use herald_store::SqliteRecordStore;
use herald_supervisor::{ServiceHandles, Supervisor, SupervisorState};
use herald_test_utils::{open_test_store, publishable_notification, MockCatalog, MockProvider};
use tokio_util::sync::CancellationToken;

struct Rig {
    supervisor: Supervisor,
    store: Arc<SqliteRecordStore>,
    provider: Arc<MockProvider>,
    _dir: tempfile::TempDir,
}

async fn rig() -> Rig {
    let (store, dir) = open_test_store().await;
    let provider = Arc::new(MockProvider::new());

    let mut config = HeraldConfig::default();
    config.queue.idle_poll_ms = 10;
    config.queue.retry_delay_ms = 20;
    config.supervisor.health_interval_secs = 1;
    config.supervisor.stop_timeout_secs = 5;

    let handles = ServiceHandles {
        store: store.clone(),
        provider: provider.clone(),
        catalog: Arc::new(MockCatalog::with(["welcome"])),
    };
    Rig {
        supervisor: Supervisor::new(config, handles),
        store,
        provider,
        _dir: dir,
    }
}

#[tokio::test]
async fn start_transitions_to_running() {
    let rig = rig().await;
    assert_eq!(rig.supervisor.state(), SupervisorState::Stopped);

    rig.supervisor.start().await.unwrap();
    assert_eq!(rig.supervisor.state(), SupervisorState::Running);
    assert!(rig.supervisor.uptime() < Duration::from_secs(1));

    // Starting twice is an error.
    assert!(rig.supervisor.start().await.is_err());

    let errors = rig.supervisor.stop().await;
    assert!(errors.is_empty(), "clean stop: {errors:?}");
    assert_eq!(rig.supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn stop_when_stopped_is_a_no_op() {
    let rig = rig().await;
    assert!(rig.supervisor.stop().await.is_empty());
    assert_eq!(rig.supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn end_to_end_insert_flows_through_to_sent() {
    let rig = rig().await;
    rig.supervisor.start().await.unwrap();

    // The change listener picks up the insert and feeds the queue.
    let id = rig
        .store
        .insert_record(&publishable_notification("welcome"))
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = rig.store.fetch_record(id).await.unwrap().unwrap();
        if record.status.is_terminal() {
            assert_eq!(record.status, NotificationStatus::Sent);
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "record never delivered (still {})",
            record.status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(rig.provider.call_count(), 1);

    rig.supervisor.stop().await;
}

#[tokio::test]
async fn pause_halts_production_and_resume_recovers() {
    let rig = rig().await;
    rig.supervisor.start().await.unwrap();
    rig.supervisor.pause();
    assert!(rig.supervisor.is_paused());

    let id = rig
        .store
        .insert_record(&publishable_notification("welcome"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let record = rig.store.fetch_record(id).await.unwrap().unwrap();
    assert_eq!(
        record.status,
        NotificationStatus::Pending,
        "paused pipeline must not deliver"
    );

    rig.supervisor.resume();

    // Events arriving during the pause were deliberately not produced;
    // resuming unblocks production for fresh inserts.
    let fresh = rig
        .store
        .insert_record(&publishable_notification("welcome"))
        .await
        .unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = rig.store.fetch_record(fresh).await.unwrap().unwrap();
        if record.status.is_terminal() {
            assert_eq!(record.status, NotificationStatus::Sent);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    rig.supervisor.stop().await;
}

#[tokio::test]
async fn reconcile_promotes_due_scheduled_records() {
    let rig = rig().await;
    rig.supervisor.start().await.unwrap();

    // Due in the past: only the poller can promote it, and the default
    // poll interval is 60s. A forced reconciliation does it now.
    let mut due = publishable_notification("welcome");
    due.scheduled_for = Some(chrono::Utc::now() - chrono::Duration::minutes(5));
    let id = rig.store.insert_record(&due).await.unwrap();

    rig.supervisor.reconcile().await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = rig.store.fetch_record(id).await.unwrap().unwrap();
        if record.status.is_terminal() {
            assert_eq!(record.status, NotificationStatus::Sent);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    rig.supervisor.stop().await;
}

#[tokio::test]
async fn health_snapshot_reports_components() {
    let rig = rig().await;
    rig.supervisor.start().await.unwrap();

    let report = rig.supervisor.check_health().await;
    assert_eq!(report.state, SupervisorState::Running);
    let names: Vec<&str> = report.components.iter().map(|c| c.name.as_str()).collect();
    assert!(names.contains(&"sqlite-store"));
    assert!(names.contains(&"delivery-queue"));
    assert!(names.contains(&"change-listener"));
    assert!(names.contains(&"cron-scheduler"));
    assert!(names.contains(&"scheduled-processor"));

    // The mock provider is healthy, the store is healthy, the queue is
    // running and shallow: aggregate must be healthy.
    assert_eq!(report.status, HealthStatus::Healthy);

    rig.supervisor.stop().await;

    let report = rig.supervisor.check_health().await;
    assert!(matches!(report.status, HealthStatus::Unhealthy(_)));
}

#[tokio::test]
async fn stop_waits_for_active_delivery() {
    let rig = rig().await;
    rig.provider.set_delay(Duration::from_millis(300)).await;
    rig.supervisor.start().await.unwrap();

    let id = rig
        .store
        .insert_record(&publishable_notification("welcome"))
        .await
        .unwrap();

    // Wait until the delivery is actually in flight.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while rig.supervisor.queue_stats().map(|s| s.active).unwrap_or(0) == 0 {
        assert!(tokio::time::Instant::now() < deadline, "delivery never started");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let errors = rig.supervisor.stop().await;
    assert!(errors.is_empty(), "stop: {errors:?}");

    let record = rig.store.fetch_record(id).await.unwrap().unwrap();
    assert_eq!(
        record.status,
        NotificationStatus::Sent,
        "in-flight delivery completed, not aborted"
    );
}

#[tokio::test]
async fn restart_after_stop_works() {
    let rig = rig().await;
    rig.supervisor.start().await.unwrap();
    rig.supervisor.stop().await;

    // The recycle loop relies on stop -> start being repeatable.
    rig.supervisor.start().await.unwrap();
    assert_eq!(rig.supervisor.state(), SupervisorState::Running);

    let id = rig
        .store
        .insert_record(&publishable_notification("welcome"))
        .await
        .unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = rig.store.fetch_record(id).await.unwrap().unwrap();
        if record.status.is_terminal() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    rig.supervisor.stop().await;
}

#[tokio::test]
async fn run_loop_stops_on_shutdown_token() {
    let rig = rig().await;
    let shutdown = CancellationToken::new();

    let supervisor = rig.supervisor.clone();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { supervisor.run(token).await });

    // Wait for the loop to bring the pipeline up.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while rig.supervisor.state() != SupervisorState::Running {
        assert!(tokio::time::Instant::now() < deadline, "never reached running");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("run loop must exit on shutdown")
        .unwrap()
        .unwrap();
    assert_eq!(rig.supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn subscription_counts_default_to_zero_when_stopped() {
    let rig = rig().await;
    let counts = rig.supervisor.subscription_counts();
    assert_eq!(counts.total, 0);
    assert_eq!(counts.active, 0);
}
