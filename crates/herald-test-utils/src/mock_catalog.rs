// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock workflow catalog for deterministic testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use herald_core::types::{Channel, WorkflowConfig};
use herald_core::{HeraldError, WorkflowCatalog};

/// A catalog backed by a fixed set of workflow keys.
///
/// Known keys resolve to an enabled workflow covering every channel;
/// unknown keys resolve to `None`. The catalog can be switched to error
/// on every lookup to exercise the infrastructure-error path.
pub struct MockCatalog {
    known: HashSet<String>,
    unreachable: AtomicBool,
}

impl MockCatalog {
    /// Create a catalog knowing the given workflow keys.
    pub fn with(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            known: keys.into_iter().map(Into::into).collect(),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Create a catalog that knows no workflows.
    pub fn empty() -> Self {
        Self::with(Vec::<String>::new())
    }

    /// Make every lookup fail as if the catalog were unreachable.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkflowCatalog for MockCatalog {
    async fn resolve(
        &self,
        workflow_key: &str,
    ) -> Result<Option<WorkflowConfig>, HeraldError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(HeraldError::Provider {
                message: "mock catalog unreachable".into(),
                source: None,
            });
        }

        if self.known.contains(workflow_key) {
            Ok(Some(WorkflowConfig {
                key: workflow_key.to_string(),
                name: format!("Workflow {workflow_key}"),
                channels: vec![
                    Channel::Email,
                    Channel::Push,
                    Channel::Sms,
                    Channel::Chat,
                    Channel::InApp,
                ],
                enabled: true,
            }))
        } else {
            Ok(None)
        }
    }
}
