// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait implemented by every supervised component.

use async_trait::async_trait;

use crate::error::HeraldError;
use crate::types::{ComponentKind, HealthStatus};

/// The base trait for all supervised Herald components.
///
/// Every part the supervisor manages (store, provider, queue, producers,
/// gateway) implements this trait, which provides identity, health check,
/// and shutdown capabilities.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Returns the human-readable name of this component instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this component.
    fn version(&self) -> semver::Version;

    /// Returns the kind of component (store, queue, scheduler, etc.).
    fn kind(&self) -> ComponentKind;

    /// Performs a health check and returns the component's current status.
    async fn health_check(&self) -> Result<HealthStatus, HeraldError>;

    /// Gracefully shuts down the component, releasing any held resources.
    async fn shutdown(&self) -> Result<(), HeraldError>;
}
