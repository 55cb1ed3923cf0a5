// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal multiplexer adapters

mod tmux;

pub use tmux::TmuxTerminal;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTerminal, TerminalCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from terminal operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("terminal session not found: {0}")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Driver for detached terminal sessions.
///
/// Operations are fail-soft where that matches how the multiplexer is
/// used: `kill`, `send_ctrl_c`, and `send_escape` succeed silently on a
/// missing session, `capture_recent` returns `None`, and `send_keys`
/// reports `NotFound` so callers can retry after a revive.
#[async_trait]
pub trait TerminalAdapter: Clone + Send + Sync + 'static {
    /// Spawn a detached session running `command`. Fatal on failure.
    /// Returns the full terminal session name (prefixed).
    async fn create(
        &self,
        name: &str,
        cwd: &Path,
        command: &str,
        cols: u16,
        rows: u16,
    ) -> Result<String, SessionError>;

    /// Kill a session; best-effort, Ok when already absent
    async fn kill(&self, name: &str) -> Result<(), SessionError>;

    async fn is_alive(&self, name: &str) -> Result<bool, SessionError>;

    /// List sessions under this supervisor's prefix
    async fn list(&self) -> Result<Vec<String>, SessionError>;

    /// Send literal text followed by Enter. `NotFound` when the session
    /// is missing.
    async fn send_keys(&self, name: &str, text: &str) -> Result<(), SessionError>;

    /// Send Ctrl-C; best-effort
    async fn send_ctrl_c(&self, name: &str) -> Result<(), SessionError>;

    /// Send Escape `count` times; best-effort
    async fn send_escape(&self, name: &str, count: u32) -> Result<(), SessionError>;

    /// Last `lines` of scrollback; `None` when the session is missing
    async fn capture_recent(&self, name: &str, lines: u32) -> Result<Option<String>, SessionError>;

    /// Larger capture for persistence/verification
    async fn capture_scrollback(&self, name: &str, lines: u32) -> Result<String, SessionError>;
}
