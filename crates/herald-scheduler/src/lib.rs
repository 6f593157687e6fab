// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producers for the Herald delivery queue.
//!
//! Three components feed the queue: the [`CronScheduler`] (recurring
//! rules), the [`ScheduledProcessor`] (one-time future-dated records),
//! and the [`ChangeListener`] (freshly inserted records). All three are
//! explicit cancellable loops owned by the supervisor.

pub mod cron;
pub mod listener;
pub mod scheduled;

pub use cron::{CronScheduler, ScheduleCounts};
pub use listener::ChangeListener;
pub use scheduled::{ScheduledProcessor, TickOutcome};
