// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record builders for tests in this crate and downstream crates.
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::session::{AgentKind, SessionId, SessionRecord};
use crate::task::{Task, TaskId, TaskSpec, TaskStatus};

/// Builder for task records with sensible test defaults.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.task.prompt = prompt.into();
        self
    }

    pub fn max_iterations(mut self, max: u32) -> Self {
        self.task.max_iterations = max;
        self
    }

    pub fn queue_position(mut self, position: u32) -> Self {
        self.task.status = TaskStatus::Queued;
        self.task.queue_position = Some(position);
        self
    }

    pub fn started_at_ms(mut self, at: u64) -> Self {
        self.task.started_at_ms = Some(at);
        self
    }

    pub fn last_progress_at_ms(mut self, at: u64) -> Self {
        self.task.last_progress_at_ms = Some(at);
        self
    }

    pub fn health_check_failures(mut self, failures: u32) -> Self {
        self.task.health_check_failures = failures;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Start building a pending task bound to `session_id`.
pub fn task_builder(id: &str, session_id: &str) -> TaskBuilder {
    TaskBuilder {
        task: Task::from_spec(
            TaskId::new(id),
            TaskSpec::new(SessionId::new(session_id), format!("task {id}"), "do the work"),
            0,
        ),
    }
}

/// A session record bound to a live-looking terminal session.
pub fn session_record(id: &str, name: &str) -> SessionRecord {
    SessionRecord {
        id: SessionId::new(id),
        name: name.to_string(),
        project_path: format!("/tmp/{name}").into(),
        terminal_session_name: format!("drover-{name}"),
        agent_kind: AgentKind::Claude,
        autonomous: false,
        initial_prompt: None,
        created_at_ms: 0,
        last_accessed_at_ms: 0,
    }
}
