// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle supervisor for the Herald delivery pipeline.
//!
//! Owns the delivery queue and its producers as a coordinated unit:
//! dependency-ordered startup, aggregate health, pause/resume, graceful
//! bounded-timeout stop, and a periodic recycle of the whole unit.

pub mod shutdown;
pub mod supervisor;

pub use shutdown::install_signal_handler;
pub use supervisor::{
    ComponentHealth, HealthReport, ServiceHandles, Supervisor, SupervisorState,
};
