// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The iterative verify-and-retry runner.
//!
//! Each iteration: send the prompt, wait for the session to quiesce,
//! capture scrollback, ask the verifier. A failed verdict feeds back into
//! the next prompt; a passed verdict completes the task; running out of
//! the iteration budget fails it.

use super::driver::{SessionDriver, WaitOutcome};
use super::{Registry, Runner, RunnerStatus, CANCEL_SCROLLBACK_LINES, RESULT_SCROLLBACK_LINES};
use crate::error::EngineError;
use crate::sessions::SessionManager;
use async_trait::async_trait;
use drover_adapters::{TerminalAdapter, VerifierAdapter, VerifyTask};
use drover_core::{Clock, Event, IdGen, RunnerKind, Task, TaskId};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Prompt injected when an iteration exhausts its wall-clock budget
const TIMEOUT_PROMPT: &str = "The previous operation timed out. Please continue or retry.";

/// Corrective prompt wrapped around verifier feedback
fn feedback_prompt(feedback: &str) -> String {
    format!(
        "The previous attempt was not successful. Here's the feedback:\n{}\nPlease address the issues mentioned above and continue working on the task.",
        feedback
    )
}

/// Verify-and-retry runner (`runner_kind = ralph`)
pub struct IterativeRunner<T, V, C: Clock, I: IdGen> {
    driver: SessionDriver<T, V, C>,
    sessions: Arc<SessionManager<T, C, I>>,
    registry: Registry,
}

impl<T: Clone, V: Clone, C: Clock, I: IdGen> Clone for IterativeRunner<T, V, C, I> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            sessions: Arc::clone(&self.sessions),
            registry: self.registry.clone(),
        }
    }
}

impl<T, V, C, I> IterativeRunner<T, V, C, I>
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

    async fn finish_failed(&self, task: Task, error: &str) {
        tracing::warn!(task_id = %task.id, error, "task failed");
        self.deregister(&task.id);
        self.driver.bus.publish(Event::TaskFailed {
            task,
            error: error.to_string(),
            at_ms: self.driver.clock.epoch_ms(),
        });
    }

    /// Send the prompt, reviving the session and retrying once on failure.
    async fn send_prompt(
        &self,
        task: &Task,
        terminal_name: &mut String,
        prompt: &str,
    ) -> Result<(), EngineError> {
        let Err(first_err) = self.driver.terminal.send_keys(terminal_name, prompt).await else {
            return Ok(());
        };
        tracing::warn!(
            task_id = %task.id,
            error = %first_err,
            "prompt send failed, attempting session revive"
        );

        let revived = self
            .sessions
            .ensure_alive(&task.session_id)
            .await
            .map_err(|_| EngineError::SendFailed(task.session_id.to_string()))?;
        *terminal_name = revived;
        self.registry.set_terminal(&task.id, terminal_name);

        self.driver
            .terminal
            .send_keys(terminal_name, prompt)
            .await
            .map_err(|_| EngineError::SendFailed(task.session_id.to_string()))
    }

    async fn run_loop(self, mut task: Task) {
        let id = task.id.clone();
        let (Some(token), Some(paused)) =
            (self.registry.token(&id), self.registry.paused_flag(&id))
        else {
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

        let mut prompt = task.prompt.clone();
        loop {
            if token.is_cancelled() {
                return;
            }
            // Pause takes effect at iteration boundaries only
            while paused.load(Ordering::Relaxed) {
                if token.is_cancelled() {
                    return;
                }
                self.driver.clock.sleep(Duration::from_secs(1)).await;
            }
            if task.current_iteration >= task.max_iterations {
                break;
            }

            task.current_iteration += 1;
            let iteration = task.current_iteration;
            self.registry
                .update_task(&id, |t| t.current_iteration = iteration);
            self.driver.bus.publish(Event::IterationStarted {
                task: task.clone(),
                iteration,
                at_ms: self.driver.clock.epoch_ms(),
            });
            self.driver
                .emit_status(&task, &format!("Iteration {} starting...", iteration));

            if self
                .send_prompt(&task, &mut terminal_name, &prompt)
                .await
                .is_err()
            {
                return self
                    .finish_failed(task, "could not send prompt to session")
                    .await;
            }

            match self
                .driver
                .wait_for_completion(&task, &terminal_name, &project_path, &token)
                .await
            {
                WaitOutcome::Cancelled => return,
                WaitOutcome::TimedOut => {
                    self.driver.bus.publish(Event::IterationCompleted {
                        task: task.clone(),
                        output: "timeout".to_string(),
                        at_ms: self.driver.clock.epoch_ms(),
                    });
                    prompt = TIMEOUT_PROMPT.to_string();
                    continue;
                }
                WaitOutcome::Quiesced => {}
            }

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

            self.driver.bus.publish(Event::VerificationStarted {
                task: task.clone(),
            });
            let verdict = self
                .driver
                .verifier
                .verify(&VerifyTask::from_task(&task), &output)
                .await;
            let result_json = serde_json::to_string(&verdict).unwrap_or_default();
            task.last_verification_result = Some(result_json.clone());
            self.registry.update_task(&id, |t| {
                t.last_verification_result = Some(result_json.clone());
            });
            self.driver.bus.publish(Event::VerificationCompleted {
                task: task.clone(),
                passed: verdict.passed,
                feedback: verdict.feedback.clone(),
                result: result_json,
                at_ms: self.driver.clock.epoch_ms(),
            });

            if verdict.passed {
                self.deregister(&id);
                self.driver.bus.publish(Event::TaskCompleted {
                    task: task.clone(),
                    result: output,
                    at_ms: self.driver.clock.epoch_ms(),
                });
                return;
            }
            prompt = feedback_prompt(&verdict.feedback);
        }

        let reason = format!("max iterations ({}) reached", task.max_iterations);
        self.finish_failed(task, &reason).await;
    }
}

#[async_trait]
impl<T, V, C, I> Runner for IterativeRunner<T, V, C, I>
where
    T: TerminalAdapter,
    V: VerifierAdapter,
    C: Clock,
    I: IdGen + 'static,
{
    fn kind(&self) -> RunnerKind {
        RunnerKind::Iterative
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
            runner.run_loop(task).await;
        });
        Ok(())
    }

    async fn pause(&self, id: &TaskId) -> Result<(), EngineError> {
        let Some((task, terminal)) = self.registry.snapshot(id) else {
            return Err(EngineError::TaskNotFound(id.to_string()));
        };
        self.driver.interrupt(&terminal).await;
        if let Some(flag) = self.registry.paused_flag(id) {
            flag.store(true, Ordering::Relaxed);
        }
        self.driver.bus.publish(Event::TaskPaused { task });
        Ok(())
    }

    async fn resume(&self, id: &TaskId) -> Result<(), EngineError> {
        let Some((task, terminal)) = self.registry.snapshot(id) else {
            return Err(EngineError::TaskNotFound(id.to_string()));
        };
        if let Err(e) = self.driver.terminal.send_keys(&terminal, "continue").await {
            tracing::warn!(task_id = %id, error = %e, "resume nudge failed");
        }
        if let Some(flag) = self.registry.paused_flag(id) {
            flag.store(false, Ordering::Relaxed);
        }
        self.driver.bus.publish(Event::TaskResumed { task });
        Ok(())
    }

    async fn cancel(&self, id: &TaskId) -> Result<(), EngineError> {
        // Idempotent: already-untracked ids are a no-op
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
#[path = "iterative_tests.rs"]
mod tests;
