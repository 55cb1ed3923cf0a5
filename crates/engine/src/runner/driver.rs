// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared loop machinery for session-driving runners: session preparation,
//! the wait-for-quiescence loop, and the agent status-file hint.

use super::SUMMARY_TAIL_LINES;
use crate::activity::ActivityMonitor;
use crate::bus::EventBus;
use crate::config::Tunables;
use drover_adapters::{TerminalAdapter, VerifierAdapter};
use drover_core::{Clock, Event, Task};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of waiting for an iteration to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    /// Session quiesced (idle or waiting for input), or the agent's status
    /// file declared the attempt finished
    Quiesced,
    /// Iteration wall-clock budget exhausted
    TimedOut,
    Cancelled,
}

/// Agent-written sidecar at `<project>/.ralph/status.json`.
///
/// Purely a hint: `completed`/`error` ends the wait early so verification
/// runs sooner. It never marks a task complete by itself.
#[derive(Debug, Deserialize)]
struct StatusFile {
    status: String,
}

fn status_file_declares_done(project_path: &Path) -> bool {
    let path = project_path.join(".ralph/status.json");
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    match serde_json::from_str::<StatusFile>(&content) {
        Ok(file) => matches!(file.status.as_str(), "completed" | "error"),
        Err(_) => false,
    }
}

/// Terminal + verifier + detector bundle shared by the session runners
pub(crate) struct SessionDriver<T, V, C: Clock> {
    pub terminal: T,
    pub verifier: V,
    pub activity: Arc<ActivityMonitor<T, C>>,
    pub bus: EventBus,
    pub clock: C,
    pub tunables: Arc<Tunables>,
}

impl<T: Clone, V: Clone, C: Clock> Clone for SessionDriver<T, V, C> {
    fn clone(&self) -> Self {
        Self {
            terminal: self.terminal.clone(),
            verifier: self.verifier.clone(),
            activity: Arc::clone(&self.activity),
            bus: self.bus.clone(),
            clock: self.clock.clone(),
            tunables: Arc::clone(&self.tunables),
        }
    }
}

impl<T: TerminalAdapter, V: VerifierAdapter, C: Clock> SessionDriver<T, V, C> {
    pub fn emit_status(&self, task: &Task, message: &str) {
        self.bus.publish(Event::StatusUpdate {
            task: task.clone(),
            message: message.to_string(),
            at_ms: self.clock.epoch_ms(),
        });
    }

    /// Send Escape twice to interrupt the agent's current activity.
    pub async fn interrupt(&self, terminal_name: &str) {
        let _ = self.terminal.send_escape(terminal_name, 2).await;
    }

    /// Wait for the session to quiesce, interrupting it if it stays busy,
    /// then clear any pending input. Returns false when cancelled.
    pub async fn prepare_session(
        &self,
        task: &Task,
        terminal_name: &str,
        token: &CancellationToken,
    ) -> bool {
        self.emit_status(task, "Waiting for session to be idle...");

        let start = self.clock.now();
        loop {
            if token.is_cancelled() {
                return false;
            }
            self.activity.poll(terminal_name).await;
            let state = self.activity.classify(terminal_name).await;
            if state.is_quiescent() {
                break;
            }
            if self
                .clock
                .now()
                .saturating_duration_since(start)
                >= self.tunables.idle_wait_timeout
            {
                self.emit_status(task, "Session busy, interrupting...");
                let _ = self.terminal.send_ctrl_c(terminal_name).await;
                self.clock.sleep(Duration::from_millis(500)).await;
                self.interrupt(terminal_name).await;
                self.clock.sleep(Duration::from_secs(1)).await;
                break;
            }
            self.clock.sleep(self.tunables.poll_interval).await;
        }

        // Clear pending input regardless of how we got here
        let _ = self.terminal.send_ctrl_c(terminal_name).await;
        self.clock.sleep(Duration::from_millis(300)).await;
        self.interrupt(terminal_name).await;
        self.clock.sleep(Duration::from_millis(300)).await;

        !token.is_cancelled()
    }

    /// Poll until the session quiesces or the iteration budget runs out.
    ///
    /// Emits verifier-backed status summaries every
    /// `status_update_interval` and synthetic progress heartbeats every
    /// `progress_heartbeat` (the watchdog's food).
    pub async fn wait_for_completion(
        &self,
        task: &Task,
        terminal_name: &str,
        project_path: &Path,
        token: &CancellationToken,
    ) -> WaitOutcome {
        let start = self.clock.now();
        let mut last_summary = start;
        let mut last_heartbeat = start;

        loop {
            let now = self.clock.now();
            if now.saturating_duration_since(start) >= self.tunables.iteration_timeout {
                return WaitOutcome::TimedOut;
            }
            if token.is_cancelled() {
                return WaitOutcome::Cancelled;
            }

            self.activity.poll(terminal_name).await;
            let state = self.activity.classify(terminal_name).await;
            if state.is_quiescent() {
                // Debounce: confirm the session is still quiet a second later
                self.clock.sleep(Duration::from_secs(1)).await;
                if token.is_cancelled() {
                    return WaitOutcome::Cancelled;
                }
                self.activity.poll(terminal_name).await;
                if self.activity.classify(terminal_name).await.is_quiescent() {
                    return WaitOutcome::Quiesced;
                }
                continue;
            }

            if status_file_declares_done(project_path) {
                tracing::debug!(task_id = %task.id, "status file declares attempt finished");
                return WaitOutcome::Quiesced;
            }

            let now = self.clock.now();
            if now.saturating_duration_since(last_summary) >= self.tunables.status_update_interval
            {
                last_summary = now;
                if let Ok(Some(tail)) = self
                    .terminal
                    .capture_recent(terminal_name, SUMMARY_TAIL_LINES)
                    .await
                {
                    let summary = self.verifier.status_summary(&task.name, &tail).await;
                    self.emit_status(task, &summary);
                }
            }
            if now.saturating_duration_since(last_heartbeat) >= self.tunables.progress_heartbeat {
                last_heartbeat = now;
                self.emit_status(
                    task,
                    &format!("Iteration {} in progress", task.current_iteration),
                );
            }

            self.clock.sleep(self.tunables.poll_interval).await;
        }
    }
}
