// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded delivery queue and worker pool for the Herald pipeline.
//!
//! Producers (change listener, cron scheduler, one-shot processor) enqueue
//! notification records; the queue's background loop fans each record out
//! to the delivery provider with bounded concurrency, retrying full
//! transient failures with exponential backoff and jitter.

pub mod backoff;
pub mod item;
pub mod queue;
mod worker;

pub use item::{EnqueueOutcome, QueueItem};
pub use queue::{DeliveryQueue, QueueStats};
