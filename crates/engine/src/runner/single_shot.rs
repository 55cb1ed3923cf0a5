// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-shot runner: one iteration, no verifier.
//!
//! Sends the prompt once and completes as soon as the session quiesces;
//! the 5000-line scrollback becomes the result. No pause/resume.

use super::driver::{SessionDriver, WaitOutcome};
use super::{Registry, Runner, RunnerStatus, CANCEL_SCROLLBACK_LINES, RESULT_SCROLLBACK_LINES};
use crate::error::EngineError;
use crate::sessions::SessionManager;
use async_trait::async_trait;
use drover_adapters::{TerminalAdapter, VerifierAdapter};
use drover_core::{Clock, Event, IdGen, RunnerKind, Task, TaskId};
use std::sync::Arc;

/// One-iteration runner (`runner_kind = simple`)
pub struct SingleShotRunner<T, V, C: Clock, I: IdGen> {
    driver: SessionDriver<T, V, C>,
    sessions: Arc<SessionManager<T, C, I>>,
    registry: Registry,
}

impl<T: Clone, V: Clone, C: Clock, I: IdGen> Clone for SingleShotRunner<T, V, C, I> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            sessions: Arc::clone(&self.sessions),
            registry: self.registry.clone(),
        }
    }
}

impl<T, V, C, I> SingleShotRunner<T, V, C, I>
where
    T: TerminalAdapter,
    V: VerifierAdapter,
    C: Clock,
    I: IdGen + 'static,
{
    pub(crate) fn new(
        driver: SessionDriver<T, V, C>,
        sessions: Arc<SessionManager<T, C, I>>,
    ) -> Self {
        Self {
            driver,
            sessions,
            registry: Registry::default(),
        }
    }

    fn deregister(&self, id: &TaskId) {
        if let Some(entry) = self.registry.remove(id) {
            self.driver.activity.forget(&entry.terminal);
        }
    }

    async fn run_once(self, mut task: Task) {
        let id = task.id.clone();
        let Some(token) = self.registry.token(&id) else {
            return;
        };
        let Some((_, mut terminal_name)) = self.registry.snapshot(&id) else {
            return;
        };
        let project_path = self
            .sessions
            .get(&task.session_id)
            .map(|record| record.project_path)
            .unwrap_or_default();

        if !self
            .driver
            .prepare_session(&task, &terminal_name, &token)
            .await
        {
            return;
        }

        task.current_iteration = 1;
        self.registry.update_task(&id, |t| t.current_iteration = 1);
        self.driver.bus.publish(Event::IterationStarted {
            task: task.clone(),
            iteration: 1,
            at_ms: self.driver.clock.epoch_ms(),
        });
        self.driver.emit_status(&task, "Iteration 1 starting...");

        // Send the prompt, retrying once after a revive
        if self
            .driver
            .terminal
            .send_keys(&terminal_name, &task.prompt)
            .await
            .is_err()
        {
            match self.sessions.ensure_alive(&task.session_id).await {
                Ok(name) => {
                    terminal_name = name;
                    self.registry.set_terminal(&id, &terminal_name);
                }
                Err(_) => {
                    return self.fail(task, "could not send prompt to session").await;
                }
            }
            if self
                .driver
                .terminal
                .send_keys(&terminal_name, &task.prompt)
                .await
                .is_err()
            {
                return self.fail(task, "could not send prompt to session").await;
            }
        }

        match self
            .driver
            .wait_for_completion(&task, &terminal_name, &project_path, &token)
            .await
        {
            WaitOutcome::Cancelled => {}
            WaitOutcome::TimedOut => self.fail(task, "timed out").await,
            WaitOutcome::Quiesced => {
                let output = self
                    .driver
                    .terminal
                    .capture_scrollback(&terminal_name, RESULT_SCROLLBACK_LINES)
                    .await
                    .unwrap_or_default();
                self.driver.bus.publish(Event::IterationCompleted {
                    task: task.clone(),
                    output: output.clone(),
                    at_ms: self.driver.clock.epoch_ms(),
                });
                self.deregister(&id);
                self.driver.bus.publish(Event::TaskCompleted {
                    task,
                    result: output,
                    at_ms: self.driver.clock.epoch_ms(),
                });
            }
        }
    }

    async fn fail(&self, task: Task, error: &str) {
        tracing::warn!(task_id = %task.id, error, "single-shot task failed");
        self.deregister(&task.id);
        self.driver.bus.publish(Event::TaskFailed {
            task,
            error: error.to_string(),
            at_ms: self.driver.clock.epoch_ms(),
        });
    }
}

#[async_trait]
impl<T, V, C, I> Runner for SingleShotRunner<T, V, C, I>
where
    T: TerminalAdapter,
    V: VerifierAdapter,
    C: Clock,
    I: IdGen + 'static,
{
    fn kind(&self) -> RunnerKind {
        RunnerKind::SingleShot
    }

    async fn start(&self, task: &Task) -> Result<(), EngineError> {
        if self.registry.contains(&task.id) {
            return Err(EngineError::AlreadyRunning(task.id.to_string()));
        }
        let terminal_name = self.sessions.ensure_alive(&task.session_id).await?;
        if !self.registry.insert(task, terminal_name) {
            return Err(EngineError::AlreadyRunning(task.id.to_string()));
        }

        let runner = self.clone();
        let task = task.clone();
        tokio::spawn(async move {
            runner.run_once(task).await;
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
        self.driver.interrupt(&entry.terminal).await;
        let result = self
            .driver
            .terminal
            .capture_scrollback(&entry.terminal, CANCEL_SCROLLBACK_LINES)
            .await
            .ok();
        entry.token.cancel();
        self.driver.activity.forget(&entry.terminal);
        self.driver.bus.publish(Event::TaskCancelled {
            task: entry.task,
            result,
            at_ms: self.driver.clock.epoch_ms(),
        });
        Ok(())
    }

    fn status(&self, id: &TaskId) -> RunnerStatus {
        self.registry.status(id)
    }
}

#[cfg(test)]
#[path = "single_shot_tests.rs"]
mod tests;
