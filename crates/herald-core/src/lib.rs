// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Herald delivery pipeline.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Herald workspace. The queue, scheduler,
//! supervisor, and adapter crates all build on the seams defined here.

pub mod error;
pub mod traits;
pub mod types;
pub mod validate;

// Re-export key items at crate root for ergonomic imports.
pub use error::HeraldError;
pub use types::{
    Channel, ComponentKind, HealthStatus, NewNotification, NotificationPayload,
    NotificationRecord, NotificationStatus, PublishStatus, RecordInserted, Rule, RuleKey,
    TriggerReceipt, WorkflowConfig,
};

pub use traits::{Component, DeliveryProvider, RecordStore, WorkflowCatalog};
