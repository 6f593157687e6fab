// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the RecordStore trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, OnceCell};
use tracing::debug;

use herald_config::model::StorageConfig;
use herald_core::types::{
    ComponentKind, HealthStatus, NewNotification, NotificationRecord, NotificationStatus,
    RecordInserted, Rule,
};
use herald_core::{Component, HeraldError, RecordStore};

use crate::database::Database;
use crate::queries;
use crate::queries::rules::NewRule;

/// Capacity of the insert-event broadcast channel. A lagging listener
/// falls back to the one-shot poller rather than blocking inserts.
const INSERT_EVENT_CAPACITY: usize = 256;

/// SQLite-backed record store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`SqliteRecordStore::initialize`]. Every successful insert is
/// published to the insert-event broadcast, which is the "row inserted"
/// subscription of the record-store contract.
pub struct SqliteRecordStore {
    config: StorageConfig,
    db: OnceCell<Database>,
    inserts: broadcast::Sender<RecordInserted>,
}

impl SqliteRecordStore {
    /// Create a new store with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        let (inserts, _) = broadcast::channel(INSERT_EVENT_CAPACITY);
        Self {
            config,
            db: OnceCell::new(),
            inserts,
        }
    }

    /// Open the database, apply PRAGMAs, and run migrations.
    pub async fn initialize(&self) -> Result<(), HeraldError> {
        let db = Database::open(&self.config.database_path).await?;
        self.db.set(db).map_err(|_| HeraldError::Store {
            source: "store already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite record store initialized");
        Ok(())
    }

    /// Checkpoint the WAL and release the connection.
    pub async fn close(&self) -> Result<(), HeraldError> {
        self.db()?.close().await
    }

    /// Insert a rule (management surface / tests).
    pub async fn insert_rule(&self, new: &NewRule) -> Result<i64, HeraldError> {
        queries::rules::insert(self.db()?, new).await
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, HeraldError> {
        self.db.get().ok_or_else(|| HeraldError::Store {
            source: "store not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl Component for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| HeraldError::Store {
                source: Box::new(e),
            })?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        // Shutdown delegates to close if the DB was initialized.
        if self.db.get().is_some() {
            self.close().await?;
            debug!("store shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_record(&self, new: &NewNotification) -> Result<i64, HeraldError> {
        let (id, newly_inserted) = queries::records::insert(self.db()?, new).await?;
        if newly_inserted {
            // No receivers is fine; the event is simply unobserved.
            let _ = self.inserts.send(RecordInserted {
                record_id: id,
                enterprise_id: new.enterprise_id.clone(),
            });
        }
        Ok(id)
    }

    async fn fetch_record(&self, id: i64) -> Result<Option<NotificationRecord>, HeraldError> {
        queries::records::fetch(self.db()?, id).await
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>, HeraldError> {
        queries::records::fetch_due(self.db()?, now, limit).await
    }

    async fn fetch_upcoming(
        &self,
        now: DateTime<Utc>,
        horizon: chrono::Duration,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>, HeraldError> {
        queries::records::fetch_upcoming(self.db()?, now, horizon, limit).await
    }

    async fn claim_record(&self, id: i64) -> Result<bool, HeraldError> {
        queries::records::claim(self.db()?, id).await
    }

    async fn finish_record(
        &self,
        id: i64,
        status: NotificationStatus,
        error_details: Option<serde_json::Value>,
        transaction_ids: &[String],
    ) -> Result<(), HeraldError> {
        let wrote =
            queries::records::finish(self.db()?, id, status, error_details, transaction_ids)
                .await?;
        if !wrote {
            debug!(record = id, ?status, "finish skipped: record already terminal");
        }
        Ok(())
    }

    async fn retract_record(&self, id: i64) -> Result<bool, HeraldError> {
        queries::records::retract(self.db()?, id).await
    }

    async fn list_cron_rules(&self) -> Result<Vec<Rule>, HeraldError> {
        queries::rules::list_cron(self.db()?).await
    }

    async fn touch_rule_executed(
        &self,
        rule_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), HeraldError> {
        queries::rules::touch_executed(self.db()?, rule_id, at).await
    }

    fn subscribe_inserts(&self) -> broadcast::Receiver<RecordInserted> {
        self.inserts.subscribe()
    }
}
