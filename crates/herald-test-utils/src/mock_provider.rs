// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock delivery provider for deterministic testing.
//!
//! `MockProvider` implements `DeliveryProvider` with scripted per-recipient
//! outcomes, enabling fast, CI-runnable tests without external API calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use herald_core::types::{
    ComponentKind, HealthStatus, NotificationPayload, TriggerReceipt,
};
use herald_core::{Component, DeliveryProvider, HeraldError};

/// A recorded provider call.
#[derive(Debug, Clone)]
pub struct TriggerCall {
    pub workflow_key: String,
    pub recipient: String,
}

/// A mock delivery provider with scripted outcomes.
///
/// By default every trigger succeeds with a generated transaction id.
/// Individual recipients can be scripted to fail, or the whole provider
/// can be switched to fail every call (for retry tests).
pub struct MockProvider {
    /// Per-recipient scripted outcomes: `Ok(transaction_id)` or `Err(message)`.
    outcomes: Mutex<HashMap<String, Result<String, String>>>,
    /// When set, every call fails regardless of scripting.
    fail_all: AtomicBool,
    /// Artificial per-call latency, for concurrency and shutdown tests.
    delay: Mutex<Option<Duration>>,
    /// All calls received, in order.
    calls: Mutex<Vec<TriggerCall>>,
    counter: AtomicUsize,
}

impl MockProvider {
    /// Create a provider where every call succeeds.
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
            fail_all: AtomicBool::new(false),
            delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        }
    }

    /// Create a provider where every call fails with a transient error.
    pub fn failing() -> Self {
        let provider = Self::new();
        provider.fail_all.store(true, Ordering::SeqCst);
        provider
    }

    /// Script the outcome for one recipient.
    pub async fn script_recipient(&self, recipient: &str, outcome: Result<String, String>) {
        self.outcomes
            .lock()
            .await
            .insert(recipient.to_string(), outcome);
    }

    /// Add artificial latency to every call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    /// Switch all calls to failure (or back).
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Number of trigger calls received so far.
    pub fn call_count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    /// Snapshot of all calls received so far.
    pub async fn calls(&self) -> Vec<TriggerCall> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        Ok(())
    }
}

#[async_trait]
impl DeliveryProvider for MockProvider {
    async fn trigger(
        &self,
        workflow_key: &str,
        recipient: &str,
        _payload: &NotificationPayload,
        _overrides: Option<&serde_json::Value>,
    ) -> Result<TriggerReceipt, HeraldError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().await.push(TriggerCall {
            workflow_key: workflow_key.to_string(),
            recipient: recipient.to_string(),
        });

        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(HeraldError::Provider {
                message: "mock provider failure".into(),
                source: None,
            });
        }

        if let Some(outcome) = self.outcomes.lock().await.get(recipient) {
            return match outcome {
                Ok(txn) => Ok(TriggerReceipt {
                    transaction_id: txn.clone(),
                }),
                Err(message) => Err(HeraldError::Provider {
                    message: message.clone(),
                    source: None,
                }),
            };
        }

        Ok(TriggerReceipt {
            transaction_id: format!("mock-txn-{n}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::types::NotificationPayload;

    fn payload() -> NotificationPayload {
        NotificationPayload::Message {
            title: None,
            body: "test".into(),
        }
    }

    #[tokio::test]
    async fn default_trigger_succeeds_with_generated_ids() {
        let provider = MockProvider::new();
        let first = provider.trigger("wf", "r1", &payload(), None).await.unwrap();
        let second = provider.trigger("wf", "r2", &payload(), None).await.unwrap();
        assert_ne!(first.transaction_id, second.transaction_id);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn failing_provider_errors_every_call() {
        let provider = MockProvider::failing();
        let err = provider
            .trigger("wf", "r1", &payload(), None)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn scripted_recipient_outcome_wins() {
        let provider = MockProvider::new();
        provider
            .script_recipient("r-bad", Err("recipient opted out".into()))
            .await;
        provider
            .script_recipient("r-good", Ok("txn-fixed".into()))
            .await;

        assert!(provider
            .trigger("wf", "r-bad", &payload(), None)
            .await
            .is_err());
        let receipt = provider
            .trigger("wf", "r-good", &payload(), None)
            .await
            .unwrap();
        assert_eq!(receipt.transaction_id, "txn-fixed");
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let provider = MockProvider::new();
        provider.trigger("wf-a", "r1", &payload(), None).await.unwrap();
        provider.trigger("wf-b", "r2", &payload(), None).await.unwrap();

        let calls = provider.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].workflow_key, "wf-a");
        assert_eq!(calls[1].recipient, "r2");
    }
}
