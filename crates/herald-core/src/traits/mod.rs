// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the delivery pipeline and its collaborators.

pub mod component;
pub mod provider;
pub mod store;

pub use component::Component;
pub use provider::{DeliveryProvider, WorkflowCatalog};
pub use store::RecordStore;
