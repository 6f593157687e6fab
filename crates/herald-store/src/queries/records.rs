// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification record operations.
//!
//! Status transitions are guarded in SQL: a record is claimed only from
//! `pending`, and terminal statuses are never overwritten by `finish`.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type};
use std::str::FromStr;
use uuid::Uuid;

use herald_core::types::{
    Channel, NewNotification, NotificationPayload, NotificationRecord, NotificationStatus,
    PublishStatus,
};
use herald_core::HeraldError;

use crate::database::{map_tr_err, Database};

const RECORD_COLUMNS: &str = "id, transaction_uuid, enterprise_id, business_id, workflow_key, \
     payload, recipients, channels, overrides, status, publish_status, scheduled_for, \
     error_details, transaction_ids, processed_at, created_at, updated_at";

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn ts_string(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_ts(idx: usize, s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    s: &str,
) -> Result<T, rusqlite::Error> {
    serde_json::from_str(s).map_err(|e| conversion_err(idx, e))
}

/// Map a full notification row (selected via [`RECORD_COLUMNS`]).
fn record_from_row(row: &rusqlite::Row<'_>) -> Result<NotificationRecord, rusqlite::Error> {
    let transaction_uuid: Option<String> = row.get(1)?;
    let payload: String = row.get(5)?;
    let recipients: String = row.get(6)?;
    let channels: String = row.get(7)?;
    let overrides: Option<String> = row.get(8)?;
    let status: String = row.get(9)?;
    let publish_status: String = row.get(10)?;
    let scheduled_for: Option<String> = row.get(11)?;
    let error_details: Option<String> = row.get(12)?;
    let transaction_ids: Option<String> = row.get(13)?;
    let processed_at: Option<String> = row.get(14)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    Ok(NotificationRecord {
        id: row.get(0)?,
        transaction_uuid: transaction_uuid
            .map(|s| Uuid::parse_str(&s).map_err(|e| conversion_err(1, e)))
            .transpose()?,
        enterprise_id: row.get(2)?,
        business_id: row.get(3)?,
        workflow_key: row.get(4)?,
        payload: parse_json::<NotificationPayload>(5, &payload)?,
        recipients: parse_json::<Vec<String>>(6, &recipients)?,
        channels: parse_json::<Vec<Channel>>(7, &channels)?,
        overrides: overrides.map(|s| parse_json(8, &s)).transpose()?,
        status: NotificationStatus::from_str(&status).map_err(|e| conversion_err(9, e))?,
        publish_status: PublishStatus::from_str(&publish_status)
            .map_err(|e| conversion_err(10, e))?,
        scheduled_for: scheduled_for.map(|s| parse_ts(11, &s)).transpose()?,
        error_details: error_details.map(|s| parse_json(12, &s)).transpose()?,
        transaction_ids: transaction_ids.map(|s| parse_json(13, &s)).transpose()?,
        processed_at: processed_at.map(|s| parse_ts(14, &s)).transpose()?,
        created_at: parse_ts(15, &created_at)?,
        updated_at: parse_ts(16, &updated_at)?,
    })
}

/// Insert a new notification record.
///
/// Returns `(id, newly_inserted)`. When the record carries a transaction
/// UUID that already exists, the existing id is returned and nothing is
/// written (idempotent-key deduplication).
pub async fn insert(
    db: &Database,
    new: &NewNotification,
) -> Result<(i64, bool), HeraldError> {
    let new = new.clone();
    db.connection()
        .call(move |conn| {
            if let Some(txn) = &new.transaction_uuid {
                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM notifications WHERE transaction_uuid = ?1",
                        params![txn.to_string()],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                if let Some(id) = existing {
                    return Ok((id, false));
                }
            }

            conn.execute(
                "INSERT INTO notifications (transaction_uuid, enterprise_id, business_id, \
                 workflow_key, payload, recipients, channels, overrides, status, \
                 publish_status, scheduled_for)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?10)",
                params![
                    new.transaction_uuid.map(|u| u.to_string()),
                    new.enterprise_id,
                    new.business_id,
                    new.workflow_key,
                    serde_json::to_string(&new.payload)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                    serde_json::to_string(&new.recipients)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                    serde_json::to_string(&new.channels)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                    new.overrides
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                    new.publish_status.to_string(),
                    new.scheduled_for.map(ts_string),
                ],
            )?;
            Ok((conn.last_insert_rowid(), true))
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a record by id.
pub async fn fetch(db: &Database, id: i64) -> Result<Option<NotificationRecord>, HeraldError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {RECORD_COLUMNS} FROM notifications WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row(params![id], record_from_row) {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch `pending`/`publish` records whose `scheduled_for` is at or before
/// `now`, oldest schedule first.
pub async fn fetch_due(
    db: &Database,
    now: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<NotificationRecord>, HeraldError> {
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM notifications
                 WHERE status = 'pending' AND publish_status = 'publish'
                   AND scheduled_for IS NOT NULL AND scheduled_for <= ?1
                 ORDER BY scheduled_for ASC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![ts_string(now), limit], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch `pending`/`publish` records scheduled strictly after `now` but
/// within `now + horizon`.
pub async fn fetch_upcoming(
    db: &Database,
    now: DateTime<Utc>,
    horizon: chrono::Duration,
    limit: u32,
) -> Result<Vec<NotificationRecord>, HeraldError> {
    let until = now + horizon;
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM notifications
                 WHERE status = 'pending' AND publish_status = 'publish'
                   AND scheduled_for IS NOT NULL
                   AND scheduled_for > ?1 AND scheduled_for <= ?2
                 ORDER BY scheduled_for ASC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![ts_string(now), ts_string(until), limit],
                    record_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Claim a record for processing (`pending -> processing`).
///
/// Returns `false` when the record was not in `pending`.
pub async fn claim(db: &Database, id: i64) -> Result<bool, HeraldError> {
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE notifications SET status = 'processing', updated_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                params![now_string(), id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Write a delivery outcome: status, error details, transaction ids, and
/// `processed_at`.
///
/// Terminal statuses are never overwritten; returns `false` when the record
/// was already terminal (or missing) and nothing was written.
pub async fn finish(
    db: &Database,
    id: i64,
    status: NotificationStatus,
    error_details: Option<serde_json::Value>,
    transaction_ids: &[String],
) -> Result<bool, HeraldError> {
    let transaction_ids = transaction_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE notifications
                 SET status = ?1, error_details = ?2, transaction_ids = ?3,
                     processed_at = ?4, updated_at = ?4
                 WHERE id = ?5 AND status IN ('pending', 'processing')",
                params![
                    status.to_string(),
                    error_details
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                    if transaction_ids.is_empty() {
                        None
                    } else {
                        Some(
                            serde_json::to_string(&transaction_ids)
                                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                        )
                    },
                    now_string(),
                    id,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Cancel a record (`pending`/`processing -> retracted`).
///
/// Returns `false` when the record was already terminal or missing.
pub async fn retract(db: &Database, id: i64) -> Result<bool, HeraldError> {
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE notifications SET status = 'retracted', updated_at = ?1
                 WHERE id = ?2 AND status IN ('pending', 'processing')",
                params![now_string(), id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::types::PublishStatus;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("records_test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn new_record(enterprise: &str) -> NewNotification {
        NewNotification {
            transaction_uuid: None,
            enterprise_id: enterprise.into(),
            business_id: None,
            workflow_key: "welcome".into(),
            payload: NotificationPayload::Message {
                title: None,
                body: "hello".into(),
            },
            recipients: vec![Uuid::new_v4().to_string()],
            channels: vec![Channel::Push],
            overrides: None,
            publish_status: PublishStatus::Publish,
            scheduled_for: None,
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_round_trip() {
        let (db, _dir) = setup_db().await;

        let (id, inserted) = insert(&db, &new_record("acme")).await.unwrap();
        assert!(inserted);
        assert!(id > 0);

        let record = fetch(&db, id).await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.enterprise_id, "acme");
        assert_eq!(record.status, NotificationStatus::Pending);
        assert_eq!(record.publish_status, PublishStatus::Publish);
        assert!(record.scheduled_for.is_none());
        assert!(record.processed_at.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fetch_missing_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(fetch(&db, 4242).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transaction_uuid_deduplicates() {
        let (db, _dir) = setup_db().await;

        let mut record = new_record("acme");
        record.transaction_uuid = Some(Uuid::new_v4());

        let (first_id, first_new) = insert(&db, &record).await.unwrap();
        let (second_id, second_new) = insert(&db, &record).await.unwrap();

        assert!(first_new);
        assert!(!second_new, "duplicate idempotency key must not insert");
        assert_eq!(first_id, second_id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn claim_only_succeeds_from_pending() {
        let (db, _dir) = setup_db().await;
        let (id, _) = insert(&db, &new_record("acme")).await.unwrap();

        assert!(claim(&db, id).await.unwrap());
        assert!(!claim(&db, id).await.unwrap(), "second claim must fail");

        let record = fetch(&db, id).await.unwrap().unwrap();
        assert_eq!(record.status, NotificationStatus::Processing);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn finish_writes_outcome_and_guards_terminal() {
        let (db, _dir) = setup_db().await;
        let (id, _) = insert(&db, &new_record("acme")).await.unwrap();
        claim(&db, id).await.unwrap();

        let details = serde_json::json!({"outcomes": [{"recipient": "r", "transaction_id": "txn-1"}]});
        let wrote = finish(
            &db,
            id,
            NotificationStatus::Sent,
            Some(details.clone()),
            &["txn-1".to_string()],
        )
        .await
        .unwrap();
        assert!(wrote);

        let record = fetch(&db, id).await.unwrap().unwrap();
        assert_eq!(record.status, NotificationStatus::Sent);
        assert_eq!(record.error_details, Some(details));
        assert_eq!(record.transaction_ids, Some(vec!["txn-1".to_string()]));
        assert!(record.processed_at.is_some());

        // A second finish against a terminal record is a no-op.
        let wrote_again = finish(&db, id, NotificationStatus::Failed, None, &[])
            .await
            .unwrap();
        assert!(!wrote_again, "terminal status must not be overwritten");
        let record = fetch(&db, id).await.unwrap().unwrap();
        assert_eq!(record.status, NotificationStatus::Sent);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn retract_from_pending_and_processing_only() {
        let (db, _dir) = setup_db().await;

        let (pending_id, _) = insert(&db, &new_record("acme")).await.unwrap();
        assert!(retract(&db, pending_id).await.unwrap());
        assert!(
            !retract(&db, pending_id).await.unwrap(),
            "retracted is terminal"
        );

        let (done_id, _) = insert(&db, &new_record("acme")).await.unwrap();
        claim(&db, done_id).await.unwrap();
        finish(&db, done_id, NotificationStatus::Sent, None, &[])
            .await
            .unwrap();
        assert!(!retract(&db, done_id).await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn due_and_upcoming_windows() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();

        let mut past = new_record("acme");
        past.scheduled_for = Some(now - chrono::Duration::minutes(5));
        let (past_id, _) = insert(&db, &past).await.unwrap();

        let mut soon = new_record("acme");
        soon.scheduled_for = Some(now + chrono::Duration::hours(1));
        let (soon_id, _) = insert(&db, &soon).await.unwrap();

        let mut far = new_record("acme");
        far.scheduled_for = Some(now + chrono::Duration::hours(48));
        insert(&db, &far).await.unwrap();

        // Unscheduled records never appear in either window.
        insert(&db, &new_record("acme")).await.unwrap();

        let due = fetch_due(&db, now, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, past_id);

        let upcoming = fetch_upcoming(&db, now, chrono::Duration::hours(24), 10)
            .await
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, soon_id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn due_respects_batch_limit_and_order() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();

        let mut ids = Vec::new();
        for minutes in [30, 20, 10] {
            let mut record = new_record("acme");
            record.scheduled_for = Some(now - chrono::Duration::minutes(minutes));
            let (id, _) = insert(&db, &record).await.unwrap();
            ids.push((minutes, id));
        }

        let due = fetch_due(&db, now, 2).await.unwrap();
        assert_eq!(due.len(), 2);
        // Oldest schedule first.
        assert_eq!(due[0].id, ids[0].1);
        assert_eq!(due[1].id, ids[1].1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn draft_records_are_not_due() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();

        let mut draft = new_record("acme");
        draft.publish_status = PublishStatus::Draft;
        draft.scheduled_for = Some(now - chrono::Duration::minutes(1));
        insert(&db, &draft).await.unwrap();

        assert!(fetch_due(&db, now, 10).await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
