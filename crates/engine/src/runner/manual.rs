// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manual runner: pure bookkeeping.
//!
//! A human performs the work; the task service reports the outcome through
//! `complete`/`fail` when the user acts via the API.

use super::{Registry, Runner, RunnerStatus};
use crate::bus::EventBus;
use crate::error::EngineError;
use async_trait::async_trait;
use drover_core::{Clock, Event, RunnerKind, Task, TaskId};

/// Human-driven runner (`runner_kind = manual`)
pub struct ManualRunner<C: Clock> {
    bus: EventBus,
    clock: C,
    registry: Registry,
}

impl<C: Clock> Clone for ManualRunner<C> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            clock: self.clock.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<C: Clock> ManualRunner<C> {
    pub(crate) fn new(bus: EventBus, clock: C) -> Self {
        Self {
            bus,
            clock,
            registry: Registry::default(),
        }
    }

    /// Record the human's successful outcome.
    pub async fn complete(&self, id: &TaskId, result: String) -> Result<(), EngineError> {
        let Some(entry) = self.registry.remove(id) else {
            return Err(EngineError::TaskNotFound(id.to_string()));
        };
        self.bus.publish(Event::TaskCompleted {
            task: entry.task,
            result,
            at_ms: self.clock.epoch_ms(),
        });
        Ok(())
    }

    /// Record the human's failed outcome.
    pub async fn fail(&self, id: &TaskId, error: String) -> Result<(), EngineError> {
        let Some(entry) = self.registry.remove(id) else {
            return Err(EngineError::TaskNotFound(id.to_string()));
        };
        self.bus.publish(Event::TaskFailed {
            task: entry.task,
            error,
            at_ms: self.clock.epoch_ms(),
        });
        Ok(())
    }
}

#[async_trait]
impl<C: Clock> Runner for ManualRunner<C> {
    fn kind(&self) -> RunnerKind {
        RunnerKind::Manual
    }

    async fn start(&self, task: &Task) -> Result<(), EngineError> {
        let mut tracked = task.clone();
        tracked.current_iteration = 1;
        if !self.registry.insert(&tracked, String::new()) {
            return Err(EngineError::AlreadyRunning(task.id.to_string()));
        }
        self.bus.publish(Event::IterationStarted {
            task: tracked,
            iteration: 1,
            at_ms: self.clock.epoch_ms(),
        });
        Ok(())
    }

    async fn pause(&self, _id: &TaskId) -> Result<(), EngineError> {
        Err(EngineError::Unsupported("pause"))
    }

    async fn resume(&self, _id: &TaskId) -> Result<(), EngineError> {
        Err(EngineError::Unsupported("resume"))
    }

    async fn cancel(&self, id: &TaskId) -> Result<(), EngineError> {
        let Some(entry) = self.registry.remove(id) else {
            return Ok(());
        };
        self.bus.publish(Event::TaskCancelled {
            task: entry.task,
            result: None,
            at_ms: self.clock.epoch_ms(),
        });
        Ok(())
    }

    fn status(&self, id: &TaskId) -> RunnerStatus {
        self.registry.status(id)
    }
}

#[cfg(test)]
#[path = "manual_tests.rs"]
mod tests;
