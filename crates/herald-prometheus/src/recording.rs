// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics.

use metrics::{describe_counter, describe_gauge};

/// Register all Herald metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_gauge!("herald_queue_depth", "Items currently waiting in the delivery queue");
    describe_gauge!(
        "herald_active_deliveries",
        "Deliveries currently being processed"
    );
    describe_gauge!(
        "herald_oldest_queued_age_seconds",
        "Age of the oldest queued item in seconds"
    );
    describe_counter!(
        "herald_notifications_delivered_total",
        "Notifications that reached the sent state"
    );
    describe_counter!(
        "herald_notifications_partial_total",
        "Notifications that reached the partial state"
    );
    describe_counter!(
        "herald_notifications_failed_total",
        "Notifications that reached the failed state"
    );
    describe_counter!("herald_delivery_retries_total", "Scheduled delivery retries");
    describe_counter!(
        "herald_queue_dropped_total",
        "Enqueues dropped because the queue was full"
    );
    describe_counter!("herald_cron_fires_total", "Cron rule fires");
    describe_counter!(
        "herald_cron_overlap_skips_total",
        "Cron fires skipped because the previous fire was still running"
    );
    describe_gauge!("herald_schedules_active", "Currently scheduled cron rules");
}

/// Set the current queue depth.
pub fn set_queue_depth(depth: f64) {
    metrics::gauge!("herald_queue_depth").set(depth);
}

/// Set the number of deliveries currently processing.
pub fn set_active_deliveries(count: f64) {
    metrics::gauge!("herald_active_deliveries").set(count);
}

/// Set the age of the oldest queued item.
pub fn set_oldest_queued_age(seconds: f64) {
    metrics::gauge!("herald_oldest_queued_age_seconds").set(seconds);
}

/// Record a terminal delivery outcome by status name.
pub fn record_outcome(status: &str) {
    match status {
        "sent" => metrics::counter!("herald_notifications_delivered_total").increment(1),
        "partial" => metrics::counter!("herald_notifications_partial_total").increment(1),
        "failed" => metrics::counter!("herald_notifications_failed_total").increment(1),
        _ => {}
    }
}

/// Record a scheduled retry.
pub fn record_retry(enterprise: &str) {
    metrics::counter!("herald_delivery_retries_total", "enterprise" => enterprise.to_string())
        .increment(1);
}

/// Record a dropped enqueue.
pub fn record_dropped() {
    metrics::counter!("herald_queue_dropped_total").increment(1);
}

/// Record a cron fire.
pub fn record_cron_fire(enterprise: &str) {
    metrics::counter!("herald_cron_fires_total", "enterprise" => enterprise.to_string())
        .increment(1);
}

/// Record a skipped overlapping cron fire.
pub fn record_cron_overlap_skip() {
    metrics::counter!("herald_cron_overlap_skips_total").increment(1);
}

/// Set the number of active cron schedules.
pub fn set_schedules_active(count: f64) {
    metrics::gauge!("herald_schedules_active").set(count);
}
