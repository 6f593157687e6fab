// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule operations.
//!
//! Rules are authored by an external management surface; this module only
//! lists them for the scheduler and records execution bookkeeping. The
//! insert helper exists for that surface (and for tests).

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type};
use std::str::FromStr;

use herald_core::types::{Channel, PublishStatus, Rule, TriggerConfig, TriggerType};
use herald_core::HeraldError;

use crate::database::{map_tr_err, Database};

/// Insert shape for a rule.
#[derive(Debug, Clone)]
pub struct NewRule {
    pub enterprise_id: String,
    pub cron_expression: String,
    pub timezone: Option<String>,
    pub enabled: bool,
    pub workflow_key: String,
    pub payload_template: serde_json::Value,
    pub recipients: Vec<String>,
    pub channels: Vec<Channel>,
    pub publish_status: PublishStatus,
}

const RULE_COLUMNS: &str = "id, enterprise_id, trigger_type, cron_expression, timezone, \
     enabled, workflow_key, payload_template, recipients, channels, publish_status, \
     deactivated, last_executed_at";

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn rule_from_row(row: &rusqlite::Row<'_>) -> Result<Rule, rusqlite::Error> {
    let trigger_type: String = row.get(2)?;
    let payload_template: String = row.get(7)?;
    let recipients: String = row.get(8)?;
    let channels: String = row.get(9)?;
    let publish_status: String = row.get(10)?;
    let last_executed_at: Option<String> = row.get(12)?;

    Ok(Rule {
        id: row.get(0)?,
        enterprise_id: row.get(1)?,
        trigger_type: TriggerType::from_str(&trigger_type).map_err(|e| conversion_err(2, e))?,
        trigger: TriggerConfig {
            cron_expression: row.get(3)?,
            timezone: row.get(4)?,
            enabled: row.get(5)?,
        },
        workflow_key: row.get(6)?,
        payload_template: serde_json::from_str(&payload_template)
            .map_err(|e| conversion_err(7, e))?,
        recipients: serde_json::from_str(&recipients).map_err(|e| conversion_err(8, e))?,
        channels: serde_json::from_str(&channels).map_err(|e| conversion_err(9, e))?,
        publish_status: PublishStatus::from_str(&publish_status)
            .map_err(|e| conversion_err(10, e))?,
        deactivated: row.get(11)?,
        last_executed_at: last_executed_at
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| conversion_err(12, e))
            })
            .transpose()?,
    })
}

/// Insert a rule and return its id.
pub async fn insert(db: &Database, new: &NewRule) -> Result<i64, HeraldError> {
    let new = new.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO rules (enterprise_id, trigger_type, cron_expression, timezone, \
                 enabled, workflow_key, payload_template, recipients, channels, publish_status)
                 VALUES (?1, 'cron', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    new.enterprise_id,
                    new.cron_expression,
                    new.timezone,
                    new.enabled,
                    new.workflow_key,
                    serde_json::to_string(&new.payload_template)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                    serde_json::to_string(&new.recipients)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                    serde_json::to_string(&new.channels)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                    new.publish_status.to_string(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// List every cron-type rule, schedulable or not.
pub async fn list_cron(db: &Database) -> Result<Vec<Rule>, HeraldError> {
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {RULE_COLUMNS} FROM rules WHERE trigger_type = 'cron' ORDER BY id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], rule_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Record that a rule fired.
pub async fn touch_executed(
    db: &Database,
    rule_id: i64,
    at: DateTime<Utc>,
) -> Result<(), HeraldError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE rules SET last_executed_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![at.to_rfc3339_opts(SecondsFormat::Millis, true), rule_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("rules_test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn new_rule(enterprise: &str, expr: &str) -> NewRule {
        NewRule {
            enterprise_id: enterprise.into(),
            cron_expression: expr.into(),
            timezone: None,
            enabled: true,
            workflow_key: "daily-digest".into(),
            payload_template: serde_json::json!({"kind": "message", "body": "digest"}),
            recipients: vec![uuid::Uuid::new_v4().to_string()],
            channels: vec![Channel::Email],
            publish_status: PublishStatus::Publish,
        }
    }

    #[tokio::test]
    async fn insert_and_list_round_trip() {
        let (db, _dir) = setup_db().await;

        let id = insert(&db, &new_rule("acme", "0 9 * * *")).await.unwrap();
        let rules = list_cron(&db).await.unwrap();
        assert_eq!(rules.len(), 1);

        let rule = &rules[0];
        assert_eq!(rule.id, id);
        assert_eq!(rule.enterprise_id, "acme");
        assert_eq!(rule.trigger.cron_expression, "0 9 * * *");
        assert!(rule.trigger.enabled);
        assert!(rule.is_schedulable());
        assert!(rule.last_executed_at.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn touch_executed_updates_bookkeeping() {
        let (db, _dir) = setup_db().await;
        let id = insert(&db, &new_rule("acme", "*/5 * * * *")).await.unwrap();

        let fired_at = Utc::now();
        touch_executed(&db, id, fired_at).await.unwrap();

        let rules = list_cron(&db).await.unwrap();
        let recorded = rules[0].last_executed_at.expect("must be recorded");
        assert!((recorded - fired_at).num_milliseconds().abs() < 10);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_returns_unschedulable_rules_too() {
        let (db, _dir) = setup_db().await;

        let mut draft = new_rule("acme", "0 9 * * *");
        draft.publish_status = PublishStatus::Draft;
        insert(&db, &draft).await.unwrap();

        let rules = list_cron(&db).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert!(!rules[0].is_schedulable());

        db.close().await.unwrap();
    }
}
