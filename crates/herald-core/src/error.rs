// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Herald delivery pipeline.

use thiserror::Error;

/// The primary error type used across all Herald components.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Record store errors (database connection, query failure, serialization).
    #[error("store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Delivery provider errors (API failure, network error, rate limiting).
    ///
    /// Provider errors are treated as transient by the retry policy.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors (malformed recipient, bad payload shape).
    ///
    /// Never retried: the same input will fail the same way.
    #[error("validation error: {0}")]
    Validation(String),

    /// The target workflow does not exist in the catalog.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    /// A rule's trigger configuration cannot be scheduled (bad cron
    /// expression, unknown timezone). Fatal for that one rule only.
    #[error("schedule error for rule {rule}: {message}")]
    Schedule { rule: String, message: String },

    /// Component health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HeraldError {
    /// Whether the retry policy may re-attempt the failed operation.
    ///
    /// Validation, missing-workflow, and configuration failures are
    /// permanent: the same input fails the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HeraldError::Provider { .. }
                | HeraldError::Store { .. }
                | HeraldError::Timeout { .. }
        )
    }
}
