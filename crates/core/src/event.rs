// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the drover supervisor.
//!
//! One tagged union covers both halves of the system:
//! - store events, committed directly by the task service and the session
//!   manager (`session:*`, `task:created`, `task:queued`, …);
//! - runner events, published on the event bus and bridged into the store
//!   by the task service (`iteration:*`, `verification:*`, `task:complete`, …).
//!
//! Runner events carry the full task snapshot at emission so external
//! subscribers never need a store read to render a notification.

use crate::session::{SessionId, SessionRecord};
use crate::task::{Task, TaskId};
use crate::verify::VerifierConfig;
use serde::{Deserialize, Serialize};

/// Events that mutate state or report runner progress.
///
/// Serializes with `{"type": "event:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // === Session lifecycle (committed by the session manager) ===
    #[serde(rename = "session:registered")]
    SessionRegistered { session: SessionRecord },

    /// The underlying terminal died and was respawned under a new name
    #[serde(rename = "session:revived")]
    SessionRevived {
        id: SessionId,
        terminal_session_name: String,
        at_ms: u64,
    },

    #[serde(rename = "session:touched")]
    SessionTouched { id: SessionId, at_ms: u64 },

    #[serde(rename = "session:removed")]
    SessionRemoved { id: SessionId },

    // === Task CRUD and queueing (committed by the task service) ===
    #[serde(rename = "task:created")]
    TaskCreated { task: Task },

    /// Field edits; only valid while the task is pending
    #[serde(rename = "task:updated")]
    TaskUpdated {
        id: TaskId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verification_prompt: Option<String>,
    },

    #[serde(rename = "task:queued")]
    TaskQueued {
        id: TaskId,
        position: u32,
        at_ms: u64,
    },

    #[serde(rename = "task:unqueued")]
    TaskUnqueued { id: TaskId },

    #[serde(rename = "task:started")]
    TaskStarted { id: TaskId, at_ms: u64 },

    /// Runner start failed after the running transition; task reverts to pending
    #[serde(rename = "task:start_failed")]
    TaskStartFailed { id: TaskId, error: String },

    #[serde(rename = "task:deleted")]
    TaskDeleted { id: TaskId },

    /// Watchdog flagged a failed health check
    #[serde(rename = "task:health_flagged")]
    HealthCheckFlagged { id: TaskId, failures: u32 },

    /// Watchdog observed recent output; failure count resets
    #[serde(rename = "task:health_cleared")]
    HealthCheckCleared { id: TaskId, at_ms: u64 },

    #[serde(rename = "verifier:config_updated")]
    VerifierConfigUpdated { config: VerifierConfig },

    // === Runner events (published on the bus, bridged to the store) ===
    #[serde(rename = "iteration:start")]
    IterationStarted {
        task: Task,
        iteration: u32,
        at_ms: u64,
    },

    #[serde(rename = "iteration:complete")]
    IterationCompleted {
        task: Task,
        output: String,
        at_ms: u64,
    },

    #[serde(rename = "verification:start")]
    VerificationStarted { task: Task },

    #[serde(rename = "verification:complete")]
    VerificationCompleted {
        task: Task,
        passed: bool,
        feedback: String,
        /// Serialized verdict JSON, persisted on the task record
        result: String,
        at_ms: u64,
    },

    #[serde(rename = "status:update")]
    StatusUpdate {
        task: Task,
        message: String,
        at_ms: u64,
    },

    #[serde(rename = "task:complete")]
    TaskCompleted {
        task: Task,
        result: String,
        at_ms: u64,
    },

    #[serde(rename = "task:failed")]
    TaskFailed {
        task: Task,
        error: String,
        at_ms: u64,
    },

    #[serde(rename = "task:paused")]
    TaskPaused { task: Task },

    #[serde(rename = "task:resumed")]
    TaskResumed { task: Task },

    #[serde(rename = "task:cancelled")]
    TaskCancelled {
        task: Task,
        /// Final scrollback captured at cancel time, when available
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        at_ms: u64,
    },
}

impl Event {
    /// Wire name of the event (`iteration:start`, `task:complete`, …)
    pub fn name(&self) -> &'static str {
        match self {
            Event::SessionRegistered { .. } => "session:registered",
            Event::SessionRevived { .. } => "session:revived",
            Event::SessionTouched { .. } => "session:touched",
            Event::SessionRemoved { .. } => "session:removed",
            Event::TaskCreated { .. } => "task:created",
            Event::TaskUpdated { .. } => "task:updated",
            Event::TaskQueued { .. } => "task:queued",
            Event::TaskUnqueued { .. } => "task:unqueued",
            Event::TaskStarted { .. } => "task:started",
            Event::TaskStartFailed { .. } => "task:start_failed",
            Event::TaskDeleted { .. } => "task:deleted",
            Event::HealthCheckFlagged { .. } => "task:health_flagged",
            Event::HealthCheckCleared { .. } => "task:health_cleared",
            Event::VerifierConfigUpdated { .. } => "verifier:config_updated",
            Event::IterationStarted { .. } => "iteration:start",
            Event::IterationCompleted { .. } => "iteration:complete",
            Event::VerificationStarted { .. } => "verification:start",
            Event::VerificationCompleted { .. } => "verification:complete",
            Event::StatusUpdate { .. } => "status:update",
            Event::TaskCompleted { .. } => "task:complete",
            Event::TaskFailed { .. } => "task:failed",
            Event::TaskPaused { .. } => "task:paused",
            Event::TaskResumed { .. } => "task:resumed",
            Event::TaskCancelled { .. } => "task:cancelled",
        }
    }

    /// The task this event targets, if any
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Event::TaskCreated { task }
            | Event::IterationStarted { task, .. }
            | Event::IterationCompleted { task, .. }
            | Event::VerificationStarted { task }
            | Event::VerificationCompleted { task, .. }
            | Event::StatusUpdate { task, .. }
            | Event::TaskCompleted { task, .. }
            | Event::TaskFailed { task, .. }
            | Event::TaskPaused { task }
            | Event::TaskResumed { task }
            | Event::TaskCancelled { task, .. } => Some(&task.id),
            Event::TaskUpdated { id, .. }
            | Event::TaskQueued { id, .. }
            | Event::TaskUnqueued { id }
            | Event::TaskStarted { id, .. }
            | Event::TaskStartFailed { id, .. }
            | Event::TaskDeleted { id }
            | Event::HealthCheckFlagged { id, .. }
            | Event::HealthCheckCleared { id, .. } => Some(id),
            Event::SessionRegistered { .. }
            | Event::SessionRevived { .. }
            | Event::SessionTouched { .. }
            | Event::SessionRemoved { .. }
            | Event::VerifierConfigUpdated { .. } => None,
        }
    }

    /// True for events that end a task (complete/failed/cancelled)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::TaskCompleted { .. } | Event::TaskFailed { .. } | Event::TaskCancelled { .. }
        )
    }

    /// One-line human description for logs
    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::SessionRegistered { session } => {
                format!("{t} id={} name={}", session.id, session.name)
            }
            Event::SessionRevived {
                id,
                terminal_session_name,
                ..
            } => format!("{t} id={id} terminal={terminal_session_name}"),
            Event::SessionTouched { id, .. } => format!("{t} id={id}"),
            Event::SessionRemoved { id } => format!("{t} id={id}"),
            Event::TaskCreated { task } => {
                format!("{t} id={} session={} kind={}", task.id, task.session_id, task.runner_kind)
            }
            Event::TaskUpdated { id, .. } => format!("{t} id={id}"),
            Event::TaskQueued { id, position, .. } => format!("{t} id={id} position={position}"),
            Event::TaskUnqueued { id } => format!("{t} id={id}"),
            Event::TaskStarted { id, .. } => format!("{t} id={id}"),
            Event::TaskStartFailed { id, error } => format!("{t} id={id} error={error}"),
            Event::TaskDeleted { id } => format!("{t} id={id}"),
            Event::HealthCheckFlagged { id, failures } => {
                format!("{t} id={id} failures={failures}")
            }
            Event::HealthCheckCleared { id, .. } => format!("{t} id={id}"),
            Event::VerifierConfigUpdated { config } => {
                format!("{t} enabled={} model={}", config.enabled, config.model)
            }
            Event::IterationStarted {
                task, iteration, ..
            } => format!("{t} id={} iteration={iteration}/{}", task.id, task.max_iterations),
            Event::IterationCompleted { task, output, .. } => {
                format!("{t} id={} output_len={}", task.id, output.len())
            }
            Event::VerificationStarted { task } => format!("{t} id={}", task.id),
            Event::VerificationCompleted { task, passed, .. } => {
                format!("{t} id={} passed={passed}", task.id)
            }
            Event::StatusUpdate { task, message, .. } => {
                format!("{t} id={} message={message}", task.id)
            }
            Event::TaskCompleted { task, .. } => format!("{t} id={}", task.id),
            Event::TaskFailed { task, error, .. } => format!("{t} id={} error={error}", task.id),
            Event::TaskPaused { task } => format!("{t} id={}", task.id),
            Event::TaskResumed { task } => format!("{t} id={}", task.id),
            Event::TaskCancelled { task, .. } => format!("{t} id={}", task.id),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
