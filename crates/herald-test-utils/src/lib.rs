// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Herald integration tests.

pub mod harness;
pub mod mock_catalog;
pub mod mock_provider;
pub mod slow_store;

pub use harness::{open_test_store, publishable_notification};
pub use mock_catalog::MockCatalog;
pub use mock_provider::{MockProvider, TriggerCall};
pub use slow_store::SlowStore;
