// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared helpers for store-backed tests.

use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use herald_config::model::StorageConfig;
use herald_core::types::{Channel, NewNotification, NotificationPayload, PublishStatus};
use herald_store::SqliteRecordStore;

/// Open an initialized SQLite record store on a temp directory.
///
/// The returned `TempDir` must be kept alive for the duration of the test.
pub async fn open_test_store() -> (Arc<SqliteRecordStore>, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("herald-test.db");
    let store = SqliteRecordStore::new(StorageConfig {
        database_path: db_path.to_str().expect("utf-8 path").to_string(),
    });
    store.initialize().await.expect("store initialize");
    (Arc::new(store), dir)
}

/// A publishable notification with one valid UUID recipient.
pub fn publishable_notification(workflow_key: &str) -> NewNotification {
    NewNotification {
        transaction_uuid: None,
        enterprise_id: "acme".into(),
        business_id: None,
        workflow_key: workflow_key.into(),
        payload: NotificationPayload::Message {
            title: None,
            body: "hello from the test harness".into(),
        },
        recipients: vec![Uuid::new_v4().to_string()],
        channels: vec![Channel::Push],
        overrides: None,
        publish_status: PublishStatus::Publish,
        scheduled_for: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::RecordStore;

    #[tokio::test]
    async fn open_test_store_is_usable() {
        let (store, _dir) = open_test_store().await;
        let id = store
            .insert_record(&publishable_notification("welcome"))
            .await
            .unwrap();
        assert!(store.fetch_record(id).await.unwrap().is_some());
    }
}
