// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records and their status machine.
//!
//! A task is one unit of work scoped to a session: a prompt plus an
//! execution policy. Lifecycle:
//! `pending → (queued →)* running → (paused ↔ running)* → {completed, failed, cancelled}`.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a task.
    pub struct TaskId;
}

/// Default iteration budget for iterative tasks
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Upper bound on the configurable iteration budget
pub const MAX_ITERATIONS_LIMIT: u32 = 100;

/// Clamp a requested iteration budget into the allowed 1..=100 range.
pub fn clamp_max_iterations(requested: u32) -> u32 {
    requested.clamp(1, MAX_ITERATIONS_LIMIT)
}

/// Which runner executes a task.
///
/// Wire values match the store schema: `ralph` (iterative verify-and-retry),
/// `simple` (single shot), `manual` (human driven).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunnerKind {
    #[default]
    #[serde(rename = "ralph")]
    Iterative,
    #[serde(rename = "simple")]
    SingleShot,
    #[serde(rename = "manual")]
    Manual,
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerKind::Iterative => write!(f, "ralph"),
            RunnerKind::SingleShot => write!(f, "simple"),
            RunnerKind::Manual => write!(f, "manual"),
        }
    }
}

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses are never mutated again (except delete)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Active statuses hold the session's single-active slot
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::Paused)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Paused => write!(f, "paused"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One unit of work scoped to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub session_id: SessionId,
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub runner_kind: RunnerKind,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub current_iteration: u32,
    pub max_iterations: u32,
    /// Custom judging criteria passed to the verifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_prompt: Option<String>,
    /// Serialized verdict JSON from the most recent verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verification_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set iff `status == Queued`; unique per session among queued tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_progress_at_ms: Option<u64>,
    #[serde(default)]
    pub health_check_failures: u32,
}

impl Task {
    /// Build a fresh pending task from a creation spec.
    pub fn from_spec(id: TaskId, spec: TaskSpec, now_ms: u64) -> Self {
        Self {
            id,
            session_id: spec.session_id,
            name: spec.name,
            prompt: spec.prompt,
            runner_kind: spec.runner_kind,
            status: TaskStatus::Pending,
            current_iteration: 0,
            max_iterations: clamp_max_iterations(
                spec.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
            ),
            verification_prompt: spec.verification_prompt,
            last_verification_result: None,
            status_message: None,
            result: None,
            error: None,
            queue_position: None,
            created_at_ms: now_ms,
            started_at_ms: None,
            completed_at_ms: None,
            last_progress_at_ms: None,
            health_check_failures: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub session_id: SessionId,
    pub name: String,
    pub prompt: String,
    pub runner_kind: RunnerKind,
    /// Requested iteration budget; clamped to 1..=100, default 10
    pub max_iterations: Option<u32>,
    pub verification_prompt: Option<String>,
    /// Start immediately after creation
    pub auto_start: bool,
}

impl TaskSpec {
    /// Minimal spec with defaults (iterative runner, default budget).
    pub fn new(session_id: SessionId, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            session_id,
            name: name.into(),
            prompt: prompt.into(),
            runner_kind: RunnerKind::default(),
            max_iterations: None,
            verification_prompt: None,
            auto_start: false,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
