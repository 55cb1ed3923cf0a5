// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state built from event replay.
//!
//! `apply_event` is the single mutation path for sessions and tasks. It
//! enforces terminal finality: once a task is completed/failed/cancelled,
//! only deletion touches it again, no matter what stale events arrive.

use drover_core::{clamp_max_iterations, Event, SessionRecord, Task, TaskStatus, VerifierConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// In-memory view of all persisted records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedState {
    /// Sessions keyed by session id
    pub sessions: HashMap<String, SessionRecord>,
    /// Tasks keyed by task id
    pub tasks: HashMap<String, Task>,
    #[serde(default)]
    pub verifier_config: VerifierConfig,
}

impl MaterializedState {
    /// Apply one event to the state.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::SessionRegistered { session } => {
                self.sessions.insert(session.id.to_string(), session.clone());
            }
            Event::SessionRevived {
                id,
                terminal_session_name,
                at_ms,
            } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    session.terminal_session_name = terminal_session_name.clone();
                    session.last_accessed_at_ms = *at_ms;
                }
            }
            Event::SessionTouched { id, at_ms } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    session.last_accessed_at_ms = *at_ms;
                }
            }
            Event::SessionRemoved { id } => {
                self.sessions.remove(id.as_str());
                // Tasks cascade with their session
                self.tasks.retain(|_, task| task.session_id != *id);
            }
            Event::TaskCreated { task } => {
                self.tasks.insert(task.id.to_string(), task.clone());
            }
            Event::TaskDeleted { id } => {
                self.tasks.remove(id.as_str());
            }
            Event::VerifierConfigUpdated { config } => {
                self.verifier_config = config.clone();
            }
            other => self.apply_task_event(other),
        }
    }

    /// Events that mutate an existing, non-terminal task record.
    fn apply_task_event(&mut self, event: &Event) {
        let Some(id) = event.task_id() else { return };
        let Some(task) = self.tasks.get_mut(id.as_str()) else {
            return;
        };
        // Terminal finality: completed/failed/cancelled records never mutate
        if task.status.is_terminal() {
            return;
        }

        match event {
            Event::TaskUpdated {
                name,
                prompt,
                max_iterations,
                verification_prompt,
                ..
            } => {
                if task.status != TaskStatus::Pending {
                    return;
                }
                if let Some(name) = name {
                    task.name = name.clone();
                }
                if let Some(prompt) = prompt {
                    task.prompt = prompt.clone();
                }
                if let Some(max) = max_iterations {
                    task.max_iterations = clamp_max_iterations(*max);
                }
                if let Some(vp) = verification_prompt {
                    task.verification_prompt = Some(vp.clone());
                }
            }
            Event::TaskQueued { position, at_ms, .. } => {
                task.status = TaskStatus::Queued;
                task.queue_position = Some(*position);
                task.last_progress_at_ms = Some(*at_ms);
            }
            Event::TaskUnqueued { .. } => {
                task.status = TaskStatus::Pending;
                task.queue_position = None;
            }
            Event::TaskStarted { at_ms, .. } => {
                task.status = TaskStatus::Running;
                task.queue_position = None;
                task.started_at_ms = Some(*at_ms);
                task.last_progress_at_ms = Some(*at_ms);
                task.health_check_failures = 0;
                task.error = None;
            }
            Event::TaskStartFailed { error, .. } => {
                task.status = TaskStatus::Pending;
                task.started_at_ms = None;
                task.error = Some(error.clone());
            }
            Event::HealthCheckFlagged { failures, .. } => {
                task.health_check_failures = *failures;
            }
            Event::HealthCheckCleared { at_ms, .. } => {
                task.health_check_failures = 0;
                task.last_progress_at_ms = Some(*at_ms);
            }
            Event::IterationStarted {
                iteration, at_ms, ..
            } => {
                task.current_iteration = (*iteration).min(task.max_iterations);
                task.last_progress_at_ms = Some(*at_ms);
            }
            Event::IterationCompleted { at_ms, .. } => {
                task.last_progress_at_ms = Some(*at_ms);
            }
            Event::VerificationStarted { .. } => {}
            Event::VerificationCompleted { result, at_ms, .. } => {
                task.last_verification_result = Some(result.clone());
                task.last_progress_at_ms = Some(*at_ms);
            }
            Event::StatusUpdate { message, at_ms, .. } => {
                task.status_message = Some(message.clone());
                task.last_progress_at_ms = Some(*at_ms);
            }
            Event::TaskCompleted { result, at_ms, .. } => {
                task.status = TaskStatus::Completed;
                task.result = Some(result.clone());
                task.completed_at_ms = Some(*at_ms);
            }
            Event::TaskFailed { error, at_ms, .. } => {
                task.status = TaskStatus::Failed;
                task.error = Some(error.clone());
                task.completed_at_ms = Some(*at_ms);
            }
            Event::TaskCancelled { result, at_ms, .. } => {
                task.status = TaskStatus::Cancelled;
                if let Some(result) = result {
                    task.result = Some(result.clone());
                }
                task.completed_at_ms = Some(*at_ms);
            }
            Event::TaskPaused { .. } => {
                if task.status == TaskStatus::Running {
                    task.status = TaskStatus::Paused;
                }
            }
            Event::TaskResumed { .. } => {
                if task.status == TaskStatus::Paused {
                    task.status = TaskStatus::Running;
                }
            }
            _ => {}
        }
    }

    // === Queries ===

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn session(&self, id: &str) -> Option<&SessionRecord> {
        self.sessions.get(id)
    }

    pub fn session_by_name(&self, name: &str) -> Option<&SessionRecord> {
        self.sessions.values().find(|s| s.name == name)
    }

    pub fn tasks_for_session(&self, session_id: &str) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.session_id.as_str() == session_id)
            .collect()
    }

    /// The single task holding the session's active slot, if any
    pub fn active_task_for_session(&self, session_id: &str) -> Option<&Task> {
        self.tasks
            .values()
            .find(|t| t.session_id.as_str() == session_id && t.is_active())
    }

    /// Queued tasks for a session, FIFO by queue position
    pub fn queued_tasks_for_session(&self, session_id: &str) -> Vec<&Task> {
        let mut queued: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| {
                t.session_id.as_str() == session_id && t.status == TaskStatus::Queued
            })
            .collect();
        queued.sort_by_key(|t| t.queue_position.unwrap_or(u32::MAX));
        queued
    }

    /// Next free queue position for a session (max + 1, starting at 1)
    pub fn next_queue_position(&self, session_id: &str) -> u32 {
        self.queued_tasks_for_session(session_id)
            .iter()
            .filter_map(|t| t.queue_position)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// All tasks currently holding an active slot (running or paused)
    pub fn active_tasks(&self) -> Vec<&Task> {
        self.tasks.values().filter(|t| t.is_active()).collect()
    }

    pub fn running_tasks(&self) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Running)
            .collect()
    }

    pub fn queued_tasks(&self) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Queued)
            .collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
