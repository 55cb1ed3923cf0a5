// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session records: durable handles to long-lived agent terminals.
//!
//! A session's identity (id and name) survives the underlying terminal
//! session dying and being revived; only `terminal_session_name` is rebound.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a supervised agent session.
    pub struct SessionId;
}

/// Kind of agent process a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Claude,
    Opencode,
    Bash,
}

impl AgentKind {
    /// Command line used to start the agent inside a fresh terminal session.
    ///
    /// Autonomous mode only applies to agents with a permission gate.
    pub fn command(&self, autonomous: bool) -> String {
        match self {
            AgentKind::Claude if autonomous => {
                "claude --dangerously-skip-permissions".to_string()
            }
            AgentKind::Claude => "claude".to_string(),
            AgentKind::Opencode => "opencode".to_string(),
            AgentKind::Bash => "bash".to_string(),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Claude => write!(f, "claude"),
            AgentKind::Opencode => write!(f, "opencode"),
            AgentKind::Bash => write!(f, "bash"),
        }
    }
}

/// A durable reference to one long-lived terminal process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    /// Human name, unique within the store
    pub name: String,
    pub project_path: PathBuf,
    /// The tmux session this record is currently bound to (rebound on revive)
    pub terminal_session_name: String,
    pub agent_kind: AgentKind,
    #[serde(default)]
    pub autonomous: bool,
    /// Replayed into the terminal after a revive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_prompt: Option<String>,
    pub created_at_ms: u64,
    pub last_accessed_at_ms: u64,
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
