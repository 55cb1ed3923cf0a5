// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle: spawn, revive, remove.
//!
//! A session's logical identity survives the underlying tmux session
//! dying. Revive spawns a fresh terminal under a `-r<n>` suffixed name,
//! replays the stored initial prompt, and rebinds the record; everything
//! that holds a terminal name re-resolves it through `ensure_alive`.

use crate::error::EngineError;
use drover_adapters::TerminalAdapter;
use drover_core::{AgentKind, Clock, Event, IdGen, SessionId, SessionRecord};
use drover_storage::TaskStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Terminal geometry for spawned sessions
const TERMINAL_COLS: u16 = 220;
const TERMINAL_ROWS: u16 = 50;

/// Settle time after spawning an agent before it accepts input
const AGENT_SETTLE: Duration = Duration::from_secs(3);

/// Input for registering a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub name: String,
    pub project_path: PathBuf,
    pub agent_kind: AgentKind,
    pub autonomous: bool,
    pub initial_prompt: Option<String>,
}

/// Creates, revives, and removes supervised sessions
pub struct SessionManager<T, C: Clock, I: IdGen> {
    terminal: T,
    store: Arc<TaskStore>,
    clock: C,
    ids: I,
    /// Revive counter per session id, for the `-r<n>` terminal suffix
    revive_counts: Mutex<HashMap<String, u32>>,
}

impl<T: TerminalAdapter, C: Clock, I: IdGen> SessionManager<T, C, I> {
    pub fn new(terminal: T, store: Arc<TaskStore>, clock: C, ids: I) -> Self {
        Self {
            terminal,
            store,
            clock,
            ids,
            revive_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn a terminal for a new session and persist the record.
    pub async fn register(&self, input: NewSession) -> Result<SessionRecord, EngineError> {
        let taken = self
            .store
            .read(|state| state.session_by_name(&input.name).is_some());
        if taken {
            return Err(EngineError::SessionExists(input.name));
        }

        let command = input.agent_kind.command(input.autonomous);
        let terminal_session_name = self
            .terminal
            .create(
                &input.name,
                &input.project_path,
                &command,
                TERMINAL_COLS,
                TERMINAL_ROWS,
            )
            .await?;

        if let Some(prompt) = &input.initial_prompt {
            self.clock.sleep(AGENT_SETTLE).await;
            if let Err(e) = self.terminal.send_keys(&terminal_session_name, prompt).await {
                tracing::warn!(session = %input.name, error = %e, "initial prompt send failed");
            }
        }

        let now_ms = self.clock.epoch_ms();
        let record = SessionRecord {
            id: SessionId::new(self.ids.next()),
            name: input.name,
            project_path: input.project_path,
            terminal_session_name,
            agent_kind: input.agent_kind,
            autonomous: input.autonomous,
            initial_prompt: input.initial_prompt,
            created_at_ms: now_ms,
            last_accessed_at_ms: now_ms,
        };
        tracing::info!(
            session_id = %record.id,
            name = %record.name,
            terminal = %record.terminal_session_name,
            "session registered"
        );
        self.store.commit(vec![Event::SessionRegistered {
            session: record.clone(),
        }])?;

        Ok(record)
    }

    pub fn get(&self, id: &SessionId) -> Result<SessionRecord, EngineError> {
        self.store
            .read(|state| state.session(id.as_str()).cloned())
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))
    }

    /// Current terminal binding, reviving the session first if it died.
    pub async fn ensure_alive(&self, id: &SessionId) -> Result<String, EngineError> {
        let record = self.get(id)?;
        let alive = self
            .terminal
            .is_alive(&record.terminal_session_name)
            .await
            .unwrap_or(false);
        if alive {
            return Ok(record.terminal_session_name);
        }
        self.revive(&record).await
    }

    /// Spawn a replacement terminal and rebind the record to it.
    async fn revive(&self, record: &SessionRecord) -> Result<String, EngineError> {
        let attempt = {
            let mut counts = self.revive_counts.lock();
            let count = counts.entry(record.id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let spawn_name = format!("{}-r{}", record.name, attempt);

        tracing::info!(
            session_id = %record.id,
            terminal = %spawn_name,
            attempt,
            "reviving dead session"
        );

        let command = record.agent_kind.command(record.autonomous);
        let terminal_session_name = self
            .terminal
            .create(
                &spawn_name,
                &record.project_path,
                &command,
                TERMINAL_COLS,
                TERMINAL_ROWS,
            )
            .await?;

        // Give the agent time to come up, then replay the initial prompt
        self.clock.sleep(AGENT_SETTLE).await;
        if let Some(prompt) = &record.initial_prompt {
            if let Err(e) = self.terminal.send_keys(&terminal_session_name, prompt).await {
                tracing::warn!(session_id = %record.id, error = %e, "initial prompt replay failed");
            }
        }

        self.store.commit(vec![Event::SessionRevived {
            id: record.id.clone(),
            terminal_session_name: terminal_session_name.clone(),
            at_ms: self.clock.epoch_ms(),
        }])?;

        Ok(terminal_session_name)
    }

    /// Record that the session was used.
    pub fn touch(&self, id: &SessionId) -> Result<(), EngineError> {
        self.store.commit(vec![Event::SessionTouched {
            id: id.clone(),
            at_ms: self.clock.epoch_ms(),
        }])?;
        Ok(())
    }

    /// Kill the underlying terminal; the record stays for a later revive.
    pub async fn kill(&self, id: &SessionId) -> Result<(), EngineError> {
        let record = self.get(id)?;
        self.terminal.kill(&record.terminal_session_name).await?;
        Ok(())
    }

    /// Kill the terminal and delete the record (tasks cascade).
    pub async fn remove(&self, id: &SessionId) -> Result<(), EngineError> {
        let record = self.get(id)?;
        let _ = self.terminal.kill(&record.terminal_session_name).await;
        self.store
            .commit(vec![Event::SessionRemoved { id: id.clone() }])?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
