// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux terminal adapter.
//!
//! One `tmux` subprocess per operation. All supervised sessions share the
//! `drover-` name prefix so `list` never touches foreign sessions.

use super::{SessionError, TerminalAdapter};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Name prefix for all sessions this supervisor owns
pub const SESSION_PREFIX: &str = "drover-";

/// Tmux-based terminal adapter
#[derive(Clone, Default)]
pub struct TmuxTerminal;

impl TmuxTerminal {
    pub fn new() -> Self {
        Self
    }

    /// Startup-time check that the tmux binary is runnable.
    ///
    /// Absence of the binary is a composition-time fatal error, not a
    /// per-call one.
    pub async fn probe() -> Result<(), SessionError> {
        let output = Command::new("tmux")
            .arg("-V")
            .output()
            .await
            .map_err(|e| SessionError::SpawnFailed(format!("tmux binary unavailable: {}", e)))?;
        if !output.status.success() {
            return Err(SessionError::SpawnFailed(
                "tmux -V exited nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

async fn run_tmux(args: &[&str]) -> Result<std::process::Output, SessionError> {
    Command::new("tmux")
        .args(args)
        .output()
        .await
        .map_err(|e| SessionError::CommandFailed(e.to_string()))
}

#[async_trait]
impl TerminalAdapter for TmuxTerminal {
    async fn create(
        &self,
        name: &str,
        cwd: &Path,
        command: &str,
        cols: u16,
        rows: u16,
    ) -> Result<String, SessionError> {
        // Precondition: cwd must exist
        if !cwd.exists() {
            return Err(SessionError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        let session_name = format!("{}{}", SESSION_PREFIX, name);

        // Replace a leftover session of the same name
        let existing = run_tmux(&["has-session", "-t", &session_name]).await;
        if existing.map(|o| o.status.success()).unwrap_or(false) {
            tracing::warn!(session_name, "session already exists, killing first");
            let _ = run_tmux(&["kill-session", "-t", &session_name]).await;
        }

        let cols = cols.to_string();
        let rows = rows.to_string();
        let output = run_tmux(&[
            "new-session",
            "-d",
            "-s",
            &session_name,
            "-x",
            &cols,
            "-y",
            &rows,
            "-c",
            &cwd.to_string_lossy(),
            command,
        ])
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(session_name, stderr = %stderr, "tmux spawn failed");
            return Err(SessionError::SpawnFailed(stderr.to_string()));
        }

        // Log stderr even on success - may contain useful warnings
        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(session_name, stderr = %stderr, "tmux spawn stderr (non-fatal)");
        }

        Ok(session_name)
    }

    async fn kill(&self, name: &str) -> Result<(), SessionError> {
        // Already-dead sessions are fine
        let _ = run_tmux(&["kill-session", "-t", name]).await?;
        Ok(())
    }

    async fn is_alive(&self, name: &str) -> Result<bool, SessionError> {
        let output = run_tmux(&["has-session", "-t", name]).await?;
        Ok(output.status.success())
    }

    async fn list(&self) -> Result<Vec<String>, SessionError> {
        let output = run_tmux(&["list-sessions", "-F", "#{session_name}"]).await?;
        if !output.status.success() {
            // No tmux server running means no sessions
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| line.starts_with(SESSION_PREFIX))
            .map(|line| line.to_string())
            .collect())
    }

    async fn send_keys(&self, name: &str, text: &str) -> Result<(), SessionError> {
        // -l = literal mode (no key name interpretation)
        // -- = end of options (handles text starting with -)
        let output = run_tmux(&["send-keys", "-t", name, "-l", "--", text]).await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(name.to_string()));
        }

        let output = run_tmux(&["send-keys", "-t", name, "Enter"]).await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn send_ctrl_c(&self, name: &str) -> Result<(), SessionError> {
        let _ = run_tmux(&["send-keys", "-t", name, "C-c"]).await?;
        Ok(())
    }

    async fn send_escape(&self, name: &str, count: u32) -> Result<(), SessionError> {
        for _ in 0..count {
            let _ = run_tmux(&["send-keys", "-t", name, "Escape"]).await?;
        }
        Ok(())
    }

    async fn capture_recent(&self, name: &str, lines: u32) -> Result<Option<String>, SessionError> {
        let from = format!("-{}", lines);
        let output = run_tmux(&["capture-pane", "-t", name, "-p", "-S", &from]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
    }

    async fn capture_scrollback(&self, name: &str, lines: u32) -> Result<String, SessionError> {
        let from = format!("-{}", lines);
        let output = run_tmux(&["capture-pane", "-t", name, "-p", "-S", &from]).await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
