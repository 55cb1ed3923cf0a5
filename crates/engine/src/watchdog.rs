// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress SLA enforcement.
//!
//! A periodic scanner over running tasks: warn on quiet, nudge and flag on
//! stuck, force-cancel on critical. Dead sessions get a bounded number of
//! revive attempts. Queued tasks stuck behind a long-running blocker break
//! the blockade, and sessions with queued work and no active task get their
//! queue re-driven. Every force-cancel flows through the task service so
//! the queue is re-evaluated.

use crate::activity::ActivityMonitor;
use crate::config::Tunables;
use crate::error::EngineError;
use crate::service::TaskService;
use crate::sessions::SessionManager;
use drover_adapters::{TerminalAdapter, VerifierAdapter};
use drover_core::{Clock, Event, IdGen, SessionId, Task};
use drover_storage::TaskStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Periodic scanner enforcing progress SLAs
pub struct Watchdog<T, V, C: Clock, I: IdGen> {
    service: Arc<TaskService<T, V, C, I>>,
    sessions: Arc<SessionManager<T, C, I>>,
    activity: Arc<ActivityMonitor<T, C>>,
    store: Arc<TaskStore>,
    terminal: T,
    tunables: Arc<Tunables>,
    clock: C,
}

impl<T, V, C, I> Watchdog<T, V, C, I>
where
    T: TerminalAdapter,
    V: VerifierAdapter,
    C: Clock,
    I: IdGen + 'static,
{
    pub fn new(
        service: Arc<TaskService<T, V, C, I>>,
        sessions: Arc<SessionManager<T, C, I>>,
        activity: Arc<ActivityMonitor<T, C>>,
        store: Arc<TaskStore>,
        terminal: T,
        tunables: Arc<Tunables>,
        clock: C,
    ) -> Self {
        Self {
            service,
            sessions,
            activity,
            store,
            terminal,
            tunables,
            clock,
        }
    }

    /// Run scans until the token cancels.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = self.clock.sleep(self.tunables.watchdog_interval) => {
                        self.scan_once().await;
                    }
                }
            }
        })
    }

    /// One full scan: running tasks, queue blockades, queue progress.
    pub async fn scan_once(&self) {
        let running: Vec<Task> = self
            .store
            .read(|state| state.running_tasks().into_iter().cloned().collect());
        for task in running {
            if let Err(e) = self.check_task(&task).await {
                tracing::warn!(task_id = %task.id, error = %e, "watchdog check failed");
            }
        }

        if let Err(e) = self.check_queues().await {
            tracing::warn!(error = %e, "watchdog queue sweep failed");
        }
    }

    /// Health-check one running task and apply the staleness ladder.
    async fn check_task(&self, task: &Task) -> Result<(), EngineError> {
        let now_ms = self.clock.epoch_ms();

        let Some(session) = self
            .store
            .read(|state| state.session(task.session_id.as_str()).cloned())
        else {
            return self
                .service
                .force_cancel(&task.id, "watchdog: session record missing", true)
                .await;
        };

        // Dead session: revive within the failure budget, then give up
        let alive = self
            .terminal
            .is_alive(&session.terminal_session_name)
            .await
            .unwrap_or(false);
        if !alive {
            if task.health_check_failures >= self.tunables.max_health_failures {
                let reason = format!(
                    "unresponsive after {} recovery attempts",
                    task.health_check_failures
                );
                return self.service.force_cancel(&task.id, &reason, true).await;
            }
            self.store.commit(vec![Event::HealthCheckFlagged {
                id: task.id.clone(),
                failures: task.health_check_failures + 1,
            }])?;
            match self.sessions.ensure_alive(&task.session_id).await {
                Ok(name) => {
                    tracing::info!(task_id = %task.id, terminal = %name, "watchdog revived session")
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "watchdog revive failed")
                }
            }
            return Ok(());
        }

        // Fresh output resets the failure count and refreshes progress
        self.activity.poll(&session.terminal_session_name).await;
        if let Some(silence) = self.activity.idle_for(&session.terminal_session_name) {
            if silence <= self.tunables.recent_output_window {
                self.store.commit(vec![Event::HealthCheckCleared {
                    id: task.id.clone(),
                    at_ms: now_ms,
                }])?;
                return Ok(());
            }
        }

        // Staleness ladder
        let started_ms = task.started_at_ms.unwrap_or(task.created_at_ms);
        let progress_ms = task.last_progress_at_ms.unwrap_or(started_ms);
        let stale = Duration::from_millis(now_ms.saturating_sub(progress_ms));
        let since_start = Duration::from_millis(now_ms.saturating_sub(started_ms));
        let never_progressed = progress_ms <= started_ms;

        if stale >= self.tunables.stale_critical
            || (never_progressed && since_start >= self.tunables.absolute_critical)
        {
            let reason = format!("watchdog: no progress for {}s", stale.as_secs());
            return self.service.force_cancel(&task.id, &reason, true).await;
        }

        if stale >= self.tunables.stale_stuck {
            let failures = task.health_check_failures + 1;
            if failures >= self.tunables.max_health_failures {
                let reason = format!("unresponsive after {} recovery attempts", failures);
                return self.service.force_cancel(&task.id, &reason, true).await;
            }
            tracing::warn!(
                task_id = %task.id,
                stale_secs = stale.as_secs(),
                failures,
                "task stuck, nudging agent"
            );
            self.store.commit(vec![Event::HealthCheckFlagged {
                id: task.id.clone(),
                failures,
            }])?;
            let _ = self
                .terminal
                .send_ctrl_c(&session.terminal_session_name)
                .await;
            self.clock.sleep(Duration::from_millis(500)).await;
            let _ = self
                .terminal
                .send_escape(&session.terminal_session_name, 2)
                .await;
            return Ok(());
        }

        if stale >= self.tunables.stale_warning {
            tracing::warn!(
                task_id = %task.id,
                stale_secs = stale.as_secs(),
                "task has made no progress recently"
            );
        }

        Ok(())
    }

    /// Break queue blockades and re-drive idle queues (queue progress).
    async fn check_queues(&self) -> Result<(), EngineError> {
        let now_ms = self.clock.epoch_ms();
        let queued: Vec<Task> = self
            .store
            .read(|state| state.queued_tasks().into_iter().cloned().collect());

        let mut sessions_with_queue: HashSet<String> = HashSet::new();
        for task in &queued {
            sessions_with_queue.insert(task.session_id.to_string());

            let queued_since_ms = task.last_progress_at_ms.unwrap_or(task.created_at_ms);
            let waiting = Duration::from_millis(now_ms.saturating_sub(queued_since_ms));
            if waiting < self.tunables.queue_block {
                continue;
            }

            let blocker = self.store.read(|state| {
                state
                    .active_task_for_session(task.session_id.as_str())
                    .cloned()
            });
            if let Some(blocker) = blocker {
                let blocker_running = Duration::from_millis(
                    now_ms.saturating_sub(blocker.started_at_ms.unwrap_or(now_ms)),
                );
                if blocker_running >= self.tunables.queue_block {
                    tracing::warn!(
                        blocker_id = %blocker.id,
                        queued_id = %task.id,
                        "watchdog breaking queue blockade"
                    );
                    self.service
                        .force_cancel(
                            &blocker.id,
                            "watchdog: blocking queued tasks past the queue SLA",
                            true,
                        )
                        .await?;
                }
            }
        }

        // Queue progress: a session with queued work and no active task
        // gets its queue re-driven within one watchdog interval
        for session_id in sessions_with_queue {
            let has_active = self
                .store
                .read(|state| state.active_task_for_session(&session_id).is_some());
            if !has_active {
                self.service
                    .process_queue(&SessionId::new(session_id))
                    .await?;
            }
        }

        Ok(())
    }

}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
