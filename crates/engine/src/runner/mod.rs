// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner framework.
//!
//! A runner owns one background loop per running task. Runners never touch
//! the store: every observable step is published on the event bus and the
//! task service persists it. The loop observes its cancellation token at
//! every suspension point; `cancel` never waits for the loop to notice.

mod driver;
mod iterative;
mod manual;
mod single_shot;

pub use iterative::IterativeRunner;
pub use manual::ManualRunner;
pub use single_shot::SingleShotRunner;

pub(crate) use driver::SessionDriver;

use crate::error::EngineError;
use async_trait::async_trait;
use drover_core::{RunnerKind, Task, TaskId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Scrollback captured for verification and final results
pub(crate) const RESULT_SCROLLBACK_LINES: u32 = 5_000;

/// Scrollback captured when a task is cancelled
pub(crate) const CANCEL_SCROLLBACK_LINES: u32 = 2_000;

/// Tail captured for verifier status summaries
pub(crate) const SUMMARY_TAIL_LINES: u32 = 500;

/// Synchronous status snapshot of a tracked task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStatus {
    pub running: bool,
    pub iteration: u32,
    pub paused: bool,
}

/// Contract every runner variant implements
#[async_trait]
pub trait Runner: Send + Sync {
    fn kind(&self) -> RunnerKind;

    fn accepts(&self, task: &Task) -> bool {
        task.runner_kind == self.kind()
    }

    /// Begin executing; fails if the task is already tracked here.
    async fn start(&self, task: &Task) -> Result<(), EngineError>;

    async fn pause(&self, id: &TaskId) -> Result<(), EngineError>;

    async fn resume(&self, id: &TaskId) -> Result<(), EngineError>;

    /// Idempotent; must terminate cleanly even with an unresponsive agent.
    async fn cancel(&self, id: &TaskId) -> Result<(), EngineError>;

    /// Zeroed record when the task is not tracked.
    fn status(&self, id: &TaskId) -> RunnerStatus;
}

/// In-memory record of one running task, owned by its runner
pub(crate) struct RunningTask {
    /// Latest task snapshot (iteration counter kept current by the loop)
    pub task: Task,
    /// Terminal session the task is bound to (rebound after revives)
    pub terminal: String,
    pub token: CancellationToken,
    pub paused: Arc<AtomicBool>,
}

/// Concurrent registry of running tasks, keyed by task id
#[derive(Clone, Default)]
pub(crate) struct Registry {
    inner: Arc<Mutex<HashMap<String, RunningTask>>>,
}

impl Registry {
    /// Insert a fresh record; false when the id is already tracked.
    pub fn insert(&self, task: &Task, terminal: String) -> bool {
        let mut inner = self.inner.lock();
        if inner.contains_key(task.id.as_str()) {
            return false;
        }
        inner.insert(
            task.id.to_string(),
            RunningTask {
                task: task.clone(),
                terminal,
                token: CancellationToken::new(),
                paused: Arc::new(AtomicBool::new(false)),
            },
        );
        true
    }

    pub fn remove(&self, id: &TaskId) -> Option<RunningTask> {
        self.inner.lock().remove(id.as_str())
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.inner.lock().contains_key(id.as_str())
    }

    pub fn status(&self, id: &TaskId) -> RunnerStatus {
        let inner = self.inner.lock();
        match inner.get(id.as_str()) {
            Some(entry) => RunnerStatus {
                running: true,
                iteration: entry.task.current_iteration,
                paused: entry.paused.load(Ordering::Relaxed),
            },
            None => RunnerStatus::default(),
        }
    }

    pub fn token(&self, id: &TaskId) -> Option<CancellationToken> {
        self.inner.lock().get(id.as_str()).map(|e| e.token.clone())
    }

    pub fn paused_flag(&self, id: &TaskId) -> Option<Arc<AtomicBool>> {
        self.inner
            .lock()
            .get(id.as_str())
            .map(|e| Arc::clone(&e.paused))
    }

    /// Latest task snapshot plus its terminal binding.
    pub fn snapshot(&self, id: &TaskId) -> Option<(Task, String)> {
        self.inner
            .lock()
            .get(id.as_str())
            .map(|e| (e.task.clone(), e.terminal.clone()))
    }

    pub fn update_task(&self, id: &TaskId, f: impl FnOnce(&mut Task)) {
        if let Some(entry) = self.inner.lock().get_mut(id.as_str()) {
            f(&mut entry.task);
        }
    }

    pub fn set_terminal(&self, id: &TaskId, terminal: &str) {
        if let Some(entry) = self.inner.lock().get_mut(id.as_str()) {
            entry.terminal = terminal.to_string();
        }
    }
}
