// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-engine: the task execution engine.
//!
//! A task drives an agent through send → quiesce → verify iterations. The
//! pieces: the [`activity::ActivityMonitor`] decides when an agent has
//! stopped working; the [`runner`] framework executes tasks (iterative,
//! single-shot, manual); the [`service::TaskService`] owns every store
//! write, serializes tasks per session, and bridges runner events into the
//! store; the [`watchdog::Watchdog`] guarantees no task hangs forever.
//! [`supervisor::Supervisor`] is the composition root - there are no
//! globals, every component receives its dependencies explicitly.

pub mod activity;
pub mod bus;
pub mod config;
pub mod error;
pub mod runner;
pub mod service;
pub mod sessions;
pub mod supervisor;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use activity::ActivityMonitor;
pub use bus::EventBus;
pub use config::{StoreConfigSource, Tunables};
pub use error::EngineError;
pub use runner::{Runner, RunnerStatus};
pub use service::{TaskPatch, TaskService};
pub use sessions::{NewSession, SessionManager};
pub use supervisor::{Supervisor, SupervisorDeps};
pub use watchdog::Watchdog;
