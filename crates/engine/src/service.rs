// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task service: public facade over task CRUD, per-session
//! serialization, runner dispatch, and the event → store bridge.
//!
//! This is the only code that writes task records. Runners communicate
//! exclusively through bus events; the bridge applies them in emission
//! order. Per-session serialization (at most one running/paused task) is
//! enforced inside a single store transaction, not by locking sessions.

use crate::activity::ActivityMonitor;
use crate::bus::EventBus;
use crate::config::Tunables;
use crate::error::EngineError;
use crate::runner::{
    IterativeRunner, ManualRunner, Runner, SessionDriver, SingleShotRunner,
};
use crate::sessions::SessionManager;
use drover_adapters::{TerminalAdapter, VerifierAdapter};
use drover_core::{Clock, Event, IdGen, RunnerKind, SessionId, Task, TaskId, TaskSpec, TaskStatus};
use drover_storage::TaskStore;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Field edits for a pending task
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub max_iterations: Option<u32>,
    pub verification_prompt: Option<String>,
}

/// Facade over task lifecycle, queueing, and runner dispatch
pub struct TaskService<T, V, C: Clock, I: IdGen> {
    store: Arc<TaskStore>,
    bus: EventBus,
    clock: C,
    ids: I,
    sessions: Arc<SessionManager<T, C, I>>,
    iterative: IterativeRunner<T, V, C, I>,
    single_shot: SingleShotRunner<T, V, C, I>,
    manual: ManualRunner<C>,
}

impl<T, V, C, I> TaskService<T, V, C, I>
where
    T: TerminalAdapter,
    V: VerifierAdapter,
    C: Clock,
    I: IdGen + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<TaskStore>,
        bus: EventBus,
        clock: C,
        ids: I,
        sessions: Arc<SessionManager<T, C, I>>,
        activity: Arc<ActivityMonitor<T, C>>,
        terminal: T,
        verifier: V,
        tunables: Arc<Tunables>,
    ) -> Self {
        let driver = SessionDriver {
            terminal,
            verifier,
            activity,
            bus: bus.clone(),
            clock: clock.clone(),
            tunables,
        };
        Self {
            iterative: IterativeRunner::new(driver.clone(), Arc::clone(&sessions)),
            single_shot: SingleShotRunner::new(driver, Arc::clone(&sessions)),
            manual: ManualRunner::new(bus.clone(), clock.clone()),
            store,
            bus,
            clock,
            ids,
            sessions,
        }
    }

    fn runner_for(&self, kind: RunnerKind) -> &dyn Runner {
        match kind {
            RunnerKind::Iterative => &self.iterative,
            RunnerKind::SingleShot => &self.single_shot,
            RunnerKind::Manual => &self.manual,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager<T, C, I>> {
        &self.sessions
    }

    // === Queries ===

    pub fn get(&self, id: &TaskId) -> Result<Task, EngineError> {
        self.store
            .read(|state| state.task(id.as_str()).cloned())
            .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<Task> {
        self.store.read(|state| state.tasks.values().cloned().collect())
    }

    pub fn list_for_session(&self, session_id: &SessionId) -> Vec<Task> {
        self.store.read(|state| {
            state
                .tasks_for_session(session_id.as_str())
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Runner-side view of a task (zeroed when untracked).
    pub fn runner_status(&self, id: &TaskId) -> Result<crate::runner::RunnerStatus, EngineError> {
        let task = self.get(id)?;
        Ok(self.runner_for(task.runner_kind).status(id))
    }

    // === Lifecycle ===

    /// Insert a pending task; optionally start it immediately.
    pub async fn create(&self, spec: TaskSpec) -> Result<Task, EngineError> {
        let auto_start = spec.auto_start;
        let id = TaskId::new(self.ids.next());
        let now_ms = self.clock.epoch_ms();

        self.store.try_commit(|state| {
            if state.session(spec.session_id.as_str()).is_none() {
                return Err(EngineError::SessionNotFound(spec.session_id.to_string()));
            }
            let task = Task::from_spec(id.clone(), spec, now_ms);
            Ok((vec![Event::TaskCreated { task }], ()))
        })?;

        if auto_start {
            self.start(&id).await?;
        }
        self.get(&id)
    }

    /// Transition pending → running and hand the task to its runner.
    ///
    /// The single-active check and the transition happen in one store
    /// transaction; a concurrent start for the same session loses with
    /// [`EngineError::SessionBusy`].
    pub async fn start(&self, id: &TaskId) -> Result<Task, EngineError> {
        let now_ms = self.clock.epoch_ms();
        self.store.try_commit(|state| {
            let task = state
                .task(id.as_str())
                .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))?;
            if task.status != TaskStatus::Pending {
                return Err(EngineError::InvalidTransition {
                    op: "start",
                    status: task.status,
                });
            }
            if state
                .active_task_for_session(task.session_id.as_str())
                .is_some()
            {
                return Err(EngineError::SessionBusy);
            }
            Ok((
                vec![Event::TaskStarted {
                    id: id.clone(),
                    at_ms: now_ms,
                }],
                (),
            ))
        })?;

        let task = self.get(id)?;
        tracing::info!(task_id = %id, kind = %task.runner_kind, "task starting");
        let runner = self.runner_for(task.runner_kind);
        if !runner.accepts(&task) {
            return Err(EngineError::Unsupported("runner dispatch"));
        }
        if let Err(e) = runner.start(&task).await {
            tracing::warn!(task_id = %id, error = %e, "runner start failed");
            self.store.commit(vec![Event::TaskStartFailed {
                id: id.clone(),
                error: e.to_string(),
            }])?;
            return Err(e);
        }
        Ok(task)
    }

    pub async fn pause(&self, id: &TaskId) -> Result<(), EngineError> {
        let task = self.get(id)?;
        if task.status != TaskStatus::Running {
            return Err(EngineError::InvalidTransition {
                op: "pause",
                status: task.status,
            });
        }
        self.runner_for(task.runner_kind).pause(id).await
    }

    pub async fn resume(&self, id: &TaskId) -> Result<(), EngineError> {
        let task = self.get(id)?;
        if task.status != TaskStatus::Paused {
            return Err(EngineError::InvalidTransition {
                op: "resume",
                status: task.status,
            });
        }
        self.runner_for(task.runner_kind).resume(id).await
    }

    /// Cancel a task. Terminal tasks are a no-op. `force` bypasses the
    /// runner entirely and writes the terminal state directly.
    pub async fn cancel(&self, id: &TaskId, force: bool) -> Result<(), EngineError> {
        let task = self.get(id)?;
        if task.is_terminal() {
            return Ok(());
        }
        if force {
            return self.force_cancel(id, "cancelled (forced)", false).await;
        }

        let runner = self.runner_for(task.runner_kind);
        if runner.status(id).running {
            runner.cancel(id).await
        } else {
            // Pending/queued, or the runner lost track of it
            self.force_cancel(id, "cancelled", false).await
        }
    }

    /// Terminal write that does not wait for (or trust) the runner loop.
    ///
    /// Stops the loop if the runner still tracks the task, then guarantees
    /// a terminal status in the store and re-evaluates the session queue.
    /// Idempotent.
    pub async fn force_cancel(
        &self,
        id: &TaskId,
        reason: &str,
        as_failure: bool,
    ) -> Result<(), EngineError> {
        let task = self.get(id)?;
        if task.is_terminal() {
            return Ok(());
        }
        let session_id = task.session_id.clone();

        let runner = self.runner_for(task.runner_kind);
        if runner.status(id).running {
            if let Err(e) = runner.cancel(id).await {
                tracing::warn!(task_id = %id, error = %e, "runner cancel failed during force-cancel");
            }
        }

        let now_ms = self.clock.epoch_ms();
        let reason = reason.to_string();
        let published = self.store.try_commit(move |state| {
            let Some(task) = state.task(id.as_str()) else {
                return Ok::<_, EngineError>((vec![], None));
            };
            if task.is_terminal() {
                return Ok((vec![], None));
            }
            let event = if as_failure {
                Event::TaskFailed {
                    task: task.clone(),
                    error: reason,
                    at_ms: now_ms,
                }
            } else {
                Event::TaskCancelled {
                    task: task.clone(),
                    result: None,
                    at_ms: now_ms,
                }
            };
            Ok((vec![event.clone()], Some(event)))
        })?;

        if let Some(event) = published {
            tracing::warn!(task_id = %id, event = %event.log_summary(), "force-cancelled");
            self.bus.publish(event);
        }
        self.process_queue(&session_id).await
    }

    /// Record a human outcome for a manual task.
    pub async fn complete_manual(&self, id: &TaskId, result: String) -> Result<(), EngineError> {
        let task = self.get(id)?;
        if task.runner_kind != RunnerKind::Manual {
            return Err(EngineError::Unsupported("manual completion"));
        }
        if !task.status.is_active() {
            return Err(EngineError::InvalidTransition {
                op: "complete",
                status: task.status,
            });
        }
        self.manual.complete(id, result).await
    }

    pub async fn fail_manual(&self, id: &TaskId, error: String) -> Result<(), EngineError> {
        let task = self.get(id)?;
        if task.runner_kind != RunnerKind::Manual {
            return Err(EngineError::Unsupported("manual failure"));
        }
        if !task.status.is_active() {
            return Err(EngineError::InvalidTransition {
                op: "fail",
                status: task.status,
            });
        }
        self.manual.fail(id, error).await
    }

    // === Queueing ===

    /// Append a pending task to its session's FIFO queue.
    pub async fn queue(&self, id: &TaskId) -> Result<Task, EngineError> {
        let now_ms = self.clock.epoch_ms();
        let session_id = self.store.try_commit(|state| {
            let task = state
                .task(id.as_str())
                .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))?;
            if task.status != TaskStatus::Pending {
                return Err(EngineError::InvalidTransition {
                    op: "queue",
                    status: task.status,
                });
            }
            let position = state.next_queue_position(task.session_id.as_str());
            Ok((
                vec![Event::TaskQueued {
                    id: id.clone(),
                    position,
                    at_ms: now_ms,
                }],
                task.session_id.clone(),
            ))
        })?;

        self.process_queue(&session_id).await?;
        self.get(id)
    }

    /// Queued → pending, releasing the queue position.
    pub fn unqueue(&self, id: &TaskId) -> Result<Task, EngineError> {
        self.store.try_commit(|state| {
            let task = state
                .task(id.as_str())
                .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))?;
            if task.status != TaskStatus::Queued {
                return Err(EngineError::InvalidTransition {
                    op: "unqueue",
                    status: task.status,
                });
            }
            Ok((vec![Event::TaskUnqueued { id: id.clone() }], ()))
        })?;
        self.get(id)
    }

    /// Promote the head of a session's queue when no task is active.
    ///
    /// On start failure the task is re-queued at its old position with the
    /// error recorded.
    pub async fn process_queue(&self, session_id: &SessionId) -> Result<(), EngineError> {
        let now_ms = self.clock.epoch_ms();
        let next = self.store.try_commit(|state| {
            if state
                .active_task_for_session(session_id.as_str())
                .is_some()
            {
                return Ok::<_, EngineError>((vec![], None));
            }
            let queued = state.queued_tasks_for_session(session_id.as_str());
            let Some(task) = queued.first() else {
                return Ok((vec![], None));
            };
            let id = task.id.clone();
            let position = task.queue_position.unwrap_or(1);
            Ok((
                vec![Event::TaskUnqueued { id: id.clone() }],
                Some((id, position)),
            ))
        })?;

        let Some((id, position)) = next else {
            return Ok(());
        };

        tracing::info!(task_id = %id, session_id = %session_id, "promoting queued task");
        if let Err(e) = self.start(&id).await {
            tracing::warn!(task_id = %id, error = %e, "queued task failed to start, re-queueing");
            self.store.commit(vec![
                Event::TaskStartFailed {
                    id: id.clone(),
                    error: e.to_string(),
                },
                Event::TaskQueued {
                    id,
                    position,
                    at_ms: now_ms,
                },
            ])?;
        }
        Ok(())
    }

    // === Editing / deletion ===

    /// Edit fields of a pending task.
    pub fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, EngineError> {
        self.store.try_commit(|state| {
            let task = state
                .task(id.as_str())
                .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))?;
            if task.status != TaskStatus::Pending {
                return Err(EngineError::InvalidTransition {
                    op: "update",
                    status: task.status,
                });
            }
            Ok((
                vec![Event::TaskUpdated {
                    id: id.clone(),
                    name: patch.name,
                    prompt: patch.prompt,
                    max_iterations: patch.max_iterations,
                    verification_prompt: patch.verification_prompt,
                }],
                (),
            ))
        })?;
        self.get(id)
    }

    /// Delete a task, cancelling it first when active.
    pub async fn delete(&self, id: &TaskId) -> Result<(), EngineError> {
        let task = self.get(id)?;
        if task.is_active() {
            self.cancel(id, false).await?;
        }
        self.store.commit(vec![Event::TaskDeleted { id: id.clone() }])?;
        Ok(())
    }

    // === Event bridge ===

    /// Spawn the bus consumer that persists runner events.
    pub fn spawn_event_bridge(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.handle_runner_event(event).await {
                            tracing::error!(error = %e, "event bridge failed to persist");
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "event bridge lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Apply one runner event to the store (events targeting a task that
    /// is already terminal are dropped - terminal finality).
    pub async fn handle_runner_event(&self, event: Event) -> Result<(), EngineError> {
        match &event {
            Event::IterationStarted { .. }
            | Event::IterationCompleted { .. }
            | Event::VerificationStarted { .. }
            | Event::VerificationCompleted { .. }
            | Event::StatusUpdate { .. }
            | Event::TaskPaused { .. }
            | Event::TaskResumed { .. } => self.commit_bridged(&event),
            Event::TaskCompleted { task, .. }
            | Event::TaskFailed { task, .. }
            | Event::TaskCancelled { task, .. } => {
                let session_id = task.session_id.clone();
                self.commit_bridged(&event)?;
                self.process_queue(&session_id).await
            }
            // Store-originated events were committed at the source
            _ => Ok(()),
        }
    }

    fn commit_bridged(&self, event: &Event) -> Result<(), EngineError> {
        self.store.try_commit(|state| {
            let Some(id) = event.task_id() else {
                return Ok::<_, EngineError>((vec![], ()));
            };
            match state.task(id.as_str()) {
                Some(task) if !task.is_terminal() => Ok((vec![event.clone()], ())),
                _ => Ok((vec![], ())),
            }
        })
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
