// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-item delivery processing.
//!
//! A worker re-checks the publish gate, claims the record, validates
//! recipients, resolves the workflow, fans out to the provider once per
//! recipient, and aggregates the outcome. Only a full transient failure
//! ("none succeeded") is retried; validation and missing-workflow failures
//! are terminal on the first attempt.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use herald_core::types::{NotificationStatus, RecipientOutcome};
use herald_core::validate::validate_recipients;
use herald_core::NotificationRecord;

use crate::backoff;
use crate::item::{EnqueueOutcome, QueueItem};
use crate::queue::QueueInner;

/// What happened to an item after one processing pass.
enum Flow {
    /// Terminal outcome (or skip); the job key can be released.
    Done,
    /// Transient full failure with retries remaining.
    Retry { item: QueueItem, delay: Duration },
}

/// Process one queue item to completion, scheduling a retry if needed.
pub(crate) async fn process_one(inner: Arc<QueueInner>, item: QueueItem) {
    let record_id = item.record_id;

    match run_delivery(&inner, item).await {
        Flow::Done => inner.release(record_id),
        Flow::Retry { item, delay } => {
            herald_prometheus::record_retry(&item.enterprise_id);
            info!(
                record = item.record_id,
                attempt = item.attempt,
                delay_ms = delay.as_millis() as u64,
                "transient delivery failure, retry scheduled"
            );
            // The job key stays held across the backoff wait so duplicate
            // enqueues of the same record keep deduplicating.
            let retry_inner = Arc::clone(&inner);
            tokio::spawn(async move {
                tokio::select! {
                    _ = retry_inner.stopping.cancelled() => {
                        retry_inner.release(item.record_id);
                    }
                    _ = tokio::time::sleep(delay) => {
                        let id = item.record_id;
                        let attempts = item.attempt - 1;
                        if retry_inner.push_retry(item) == EnqueueOutcome::Dropped {
                            warn!(record = id, "queue full on retry re-append, failing record");
                            let details = serde_json::json!({
                                "error": "delivery queue full when re-appending retry",
                                "attempts": attempts,
                            });
                            if let Err(e) = retry_inner
                                .store
                                .finish_record(id, NotificationStatus::Failed, Some(details), &[])
                                .await
                            {
                                error!(record = id, error = %e, "failed to persist failure");
                            }
                            herald_prometheus::record_outcome("failed");
                            retry_inner.release(id);
                        }
                    }
                }
            });
        }
    }

    inner.active.fetch_sub(1, Ordering::SeqCst);
    herald_prometheus::set_active_deliveries(inner.active.load(Ordering::SeqCst) as f64);
}

/// One delivery pass over a single record.
async fn run_delivery(inner: &Arc<QueueInner>, item: QueueItem) -> Flow {
    let record = match inner.store.fetch_record(item.record_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!(record = item.record_id, "queued record no longer exists, skipping");
            return Flow::Done;
        }
        Err(e) => {
            error!(record = item.record_id, error = %e, "store fetch failed");
            return transient_failure(inner, item, format!("store fetch failed: {e}"), Vec::new())
                .await;
        }
    };

    // Publish gate, re-checked before every attempt. Not a failure: the
    // record simply is not eligible yet.
    if !record.publish_status.is_deliverable() {
        debug!(
            record = record.id,
            publish_status = %record.publish_status,
            "record not published, skipping"
        );
        return Flow::Done;
    }

    // Terminal states are never reprocessed (covers cancellation races).
    if record.status.is_terminal() {
        debug!(record = record.id, status = %record.status, "record already terminal, skipping");
        return Flow::Done;
    }

    if item.attempt == 1 {
        match inner.store.claim_record(record.id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(record = record.id, "record already claimed, skipping");
                return Flow::Done;
            }
            Err(e) => {
                error!(record = record.id, error = %e, "claim failed");
                return transient_failure(inner, item, format!("claim failed: {e}"), Vec::new())
                    .await;
            }
        }
    } else if record.status != NotificationStatus::Processing {
        // A retry only proceeds on the record it still owns.
        debug!(record = record.id, status = %record.status, "retry lost ownership, skipping");
        return Flow::Done;
    }

    // Recipient validation is permanent: no retry can fix a malformed id.
    if let Err(e) = validate_recipients(&record.recipients) {
        return permanent_failure(inner, &item, &record, e.to_string()).await;
    }

    match inner.catalog.resolve(&record.workflow_key).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return permanent_failure(
                inner,
                &item,
                &record,
                format!("workflow not found: {}", record.workflow_key),
            )
            .await;
        }
        Err(e) => {
            return transient_failure(
                inner,
                item,
                format!("workflow resolution failed: {e}"),
                Vec::new(),
            )
            .await;
        }
    }

    // Fan out: one provider call per recipient, in parallel.
    let calls = record.recipients.iter().map(|recipient| {
        let provider = Arc::clone(&inner.provider);
        let workflow_key = record.workflow_key.clone();
        let payload = record.payload.clone();
        let overrides = record.overrides.clone();
        let recipient = recipient.clone();
        async move {
            match provider
                .trigger(&workflow_key, &recipient, &payload, overrides.as_ref())
                .await
            {
                Ok(receipt) => RecipientOutcome {
                    recipient,
                    transaction_id: Some(receipt.transaction_id),
                    error: None,
                },
                Err(e) => RecipientOutcome {
                    recipient,
                    transaction_id: None,
                    error: Some(e.to_string()),
                },
            }
        }
    });
    let outcomes: Vec<RecipientOutcome> = join_all(calls).await;

    let transaction_ids: Vec<String> = outcomes
        .iter()
        .filter_map(|o| o.transaction_id.clone())
        .collect();
    let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();

    if succeeded == outcomes.len() {
        finish(
            inner,
            record.id,
            NotificationStatus::Sent,
            None,
            &transaction_ids,
        )
        .await;
        info!(
            record = record.id,
            recipients = outcomes.len(),
            "notification delivered"
        );
        herald_prometheus::record_outcome("sent");
        Flow::Done
    } else if succeeded > 0 {
        // Partial success is terminal: retrying would re-deliver to the
        // recipients that already succeeded.
        let details = serde_json::json!({
            "outcomes": outcomes,
            "attempts": item.attempt,
        });
        finish(
            inner,
            record.id,
            NotificationStatus::Partial,
            Some(details),
            &transaction_ids,
        )
        .await;
        warn!(
            record = record.id,
            succeeded,
            failed = outcomes.len() - succeeded,
            "notification partially delivered"
        );
        herald_prometheus::record_outcome("partial");
        Flow::Done
    } else {
        let last_error = outcomes
            .iter()
            .filter_map(|o| o.error.clone())
            .next_back()
            .unwrap_or_else(|| "no recipients attempted".into());
        transient_failure(
            inner,
            item,
            format!("all recipients failed: {last_error}"),
            outcomes,
        )
        .await
    }
}

/// Terminal validation/configuration failure: persisted immediately,
/// never retried.
async fn permanent_failure(
    inner: &Arc<QueueInner>,
    item: &QueueItem,
    record: &NotificationRecord,
    message: String,
) -> Flow {
    warn!(record = record.id, error = %message, "permanent delivery failure");
    let details = serde_json::json!({
        "error": message,
        "attempts": item.attempt,
        "retriable": false,
    });
    finish(inner, record.id, NotificationStatus::Failed, Some(details), &[]).await;
    herald_prometheus::record_outcome("failed");
    Flow::Done
}

/// Transient failure: retry with exponential backoff while attempts
/// remain, otherwise fail terminally with the attempt count recorded.
async fn transient_failure(
    inner: &Arc<QueueInner>,
    item: QueueItem,
    message: String,
    outcomes: Vec<RecipientOutcome>,
) -> Flow {
    if item.attempt <= inner.config.retry_attempts {
        let delay = backoff::retry_delay(item.attempt, inner.config.retry_delay_ms);
        return Flow::Retry {
            item: item.next_attempt(),
            delay,
        };
    }

    warn!(
        record = item.record_id,
        attempts = item.attempt,
        error = %message,
        "retries exhausted, failing record"
    );
    let details = serde_json::json!({
        "error": message,
        "attempts": item.attempt,
        "outcomes": outcomes,
    });
    finish(
        inner,
        item.record_id,
        NotificationStatus::Failed,
        Some(details),
        &[],
    )
    .await;
    herald_prometheus::record_outcome("failed");
    Flow::Done
}

async fn finish(
    inner: &Arc<QueueInner>,
    record_id: i64,
    status: NotificationStatus,
    details: Option<serde_json::Value>,
    transaction_ids: &[String],
) {
    if let Err(e) = inner
        .store
        .finish_record(record_id, status, details, transaction_ids)
        .await
    {
        error!(record = record_id, error = %e, "failed to persist delivery outcome");
    }
}
