// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ephemeral queue entry types.

use tokio::time::Instant;

/// An entry in the delivery queue.
///
/// Owned exclusively by the queue; destroyed on terminal success/failure
/// or explicit clear. The record id doubles as the derived job key used
/// for duplicate-enqueue deduplication.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub record_id: i64,
    pub enterprise_id: String,
    /// Execution number, 1-based. Attempt 1 is the initial delivery;
    /// higher attempts are retries.
    pub attempt: u32,
    pub enqueued_at: Instant,
}

impl QueueItem {
    pub fn initial(record_id: i64, enterprise_id: impl Into<String>) -> Self {
        Self {
            record_id,
            enterprise_id: enterprise_id.into(),
            attempt: 1,
            enqueued_at: Instant::now(),
        }
    }

    /// The follow-up item for the next retry of this delivery.
    pub fn next_attempt(&self) -> Self {
        Self {
            record_id: self.record_id,
            enterprise_id: self.enterprise_id.clone(),
            attempt: self.attempt + 1,
            enqueued_at: Instant::now(),
        }
    }
}

/// Result of an enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The item was appended to the queue.
    Queued,
    /// An item with the same job key is already queued or in flight.
    Deduplicated,
    /// The queue was at capacity; the item was dropped and counted.
    Dropped,
}
