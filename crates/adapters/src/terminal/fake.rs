// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake terminal adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{SessionError, TerminalAdapter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded terminal call
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalCall {
    Create {
        name: String,
        cwd: PathBuf,
        command: String,
    },
    Kill {
        name: String,
    },
    SendKeys {
        name: String,
        text: String,
    },
    CtrlC {
        name: String,
    },
    Escape {
        name: String,
        count: u32,
    },
    CaptureRecent {
        name: String,
        lines: u32,
    },
    CaptureScrollback {
        name: String,
        lines: u32,
    },
}

#[derive(Debug, Clone)]
struct FakeSession {
    alive: bool,
    /// Screen contents observed by successive captures; the last frame
    /// repeats once the queue drains, so output eventually looks still.
    frames: VecDeque<String>,
    current: String,
    /// Remaining send_keys calls to fail with NotFound
    failing_sends: u32,
}

#[derive(Default)]
struct FakeTerminalState {
    sessions: HashMap<String, FakeSession>,
    calls: Vec<TerminalCall>,
    /// Remaining create calls to fail with SpawnFailed
    failing_creates: u32,
}

/// Fake terminal adapter with scripted per-session output frames
#[derive(Clone, Default)]
pub struct FakeTerminal {
    inner: Arc<Mutex<FakeTerminalState>>,
}

impl FakeTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls
    pub fn calls(&self) -> Vec<TerminalCall> {
        self.inner.lock().calls.clone()
    }

    /// Text sent to a session via send_keys, in order
    pub fn sent_keys(&self, name: &str) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TerminalCall::SendKeys { name: n, text } if n == name => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Add a session without going through create
    pub fn add_session(&self, name: &str, alive: bool) {
        self.inner.lock().sessions.insert(
            name.to_string(),
            FakeSession {
                alive,
                frames: VecDeque::new(),
                current: String::new(),
                failing_sends: 0,
            },
        );
    }

    /// Queue output frames a session will show to successive captures
    pub fn set_frames(&self, name: &str, frames: Vec<&str>) {
        if let Some(session) = self.inner.lock().sessions.get_mut(name) {
            session.frames = frames.into_iter().map(|f| f.to_string()).collect();
        }
    }

    /// Append one future output frame
    pub fn push_frame(&self, name: &str, frame: String) {
        if let Some(session) = self.inner.lock().sessions.get_mut(name) {
            session.frames.push_back(frame);
        }
    }

    /// Replace the current screen content immediately
    pub fn set_output(&self, name: &str, content: &str) {
        if let Some(session) = self.inner.lock().sessions.get_mut(name) {
            session.frames.clear();
            session.current = content.to_string();
        }
    }

    pub fn set_alive(&self, name: &str, alive: bool) {
        if let Some(session) = self.inner.lock().sessions.get_mut(name) {
            session.alive = alive;
        }
    }

    pub fn is_session_alive(&self, name: &str) -> bool {
        self.inner
            .lock()
            .sessions
            .get(name)
            .map(|s| s.alive)
            .unwrap_or(false)
    }

    /// Make the next `count` create calls fail with SpawnFailed
    pub fn fail_creates(&self, count: u32) {
        self.inner.lock().failing_creates = count;
    }

    /// Make the next `count` send_keys calls fail with NotFound
    pub fn fail_sends(&self, name: &str, count: u32) {
        if let Some(session) = self.inner.lock().sessions.get_mut(name) {
            session.failing_sends = count;
        }
    }

    /// Advance to the next frame (if any) and return the current screen
    fn observe(&self, name: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let session = inner.sessions.get_mut(name)?;
        if !session.alive {
            return None;
        }
        if let Some(next) = session.frames.pop_front() {
            session.current = next;
        }
        Some(session.current.clone())
    }

    fn tail(content: &str, lines: u32) -> String {
        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(lines as usize);
        all[start..].join("\n")
    }
}

#[async_trait]
impl TerminalAdapter for FakeTerminal {
    async fn create(
        &self,
        name: &str,
        cwd: &Path,
        command: &str,
        _cols: u16,
        _rows: u16,
    ) -> Result<String, SessionError> {
        let session_name = format!("drover-{}", name);
        let mut inner = self.inner.lock();
        inner.calls.push(TerminalCall::Create {
            name: session_name.clone(),
            cwd: cwd.to_path_buf(),
            command: command.to_string(),
        });
        if inner.failing_creates > 0 {
            inner.failing_creates -= 1;
            return Err(SessionError::SpawnFailed("injected spawn failure".to_string()));
        }
        inner.sessions.insert(
            session_name.clone(),
            FakeSession {
                alive: true,
                frames: VecDeque::new(),
                current: "$ ".to_string(),
                failing_sends: 0,
            },
        );
        Ok(session_name)
    }

    async fn kill(&self, name: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        inner.calls.push(TerminalCall::Kill {
            name: name.to_string(),
        });
        if let Some(session) = inner.sessions.get_mut(name) {
            session.alive = false;
        }
        Ok(())
    }

    async fn is_alive(&self, name: &str) -> Result<bool, SessionError> {
        Ok(self.is_session_alive(name))
    }

    async fn list(&self) -> Result<Vec<String>, SessionError> {
        Ok(self
            .inner
            .lock()
            .sessions
            .iter()
            .filter(|(name, session)| session.alive && name.starts_with("drover-"))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn send_keys(&self, name: &str, text: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        inner.calls.push(TerminalCall::SendKeys {
            name: name.to_string(),
            text: text.to_string(),
        });
        match inner.sessions.get_mut(name) {
            Some(session) if session.alive => {
                if session.failing_sends > 0 {
                    session.failing_sends -= 1;
                    return Err(SessionError::NotFound(name.to_string()));
                }
                Ok(())
            }
            _ => Err(SessionError::NotFound(name.to_string())),
        }
    }

    async fn send_ctrl_c(&self, name: &str) -> Result<(), SessionError> {
        self.inner.lock().calls.push(TerminalCall::CtrlC {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn send_escape(&self, name: &str, count: u32) -> Result<(), SessionError> {
        self.inner.lock().calls.push(TerminalCall::Escape {
            name: name.to_string(),
            count,
        });
        Ok(())
    }

    async fn capture_recent(&self, name: &str, lines: u32) -> Result<Option<String>, SessionError> {
        self.inner.lock().calls.push(TerminalCall::CaptureRecent {
            name: name.to_string(),
            lines,
        });
        Ok(self.observe(name).map(|content| Self::tail(&content, lines)))
    }

    async fn capture_scrollback(&self, name: &str, lines: u32) -> Result<String, SessionError> {
        self.inner
            .lock()
            .calls
            .push(TerminalCall::CaptureScrollback {
                name: name.to_string(),
                lines,
            });
        match self.observe(name) {
            Some(content) => Ok(Self::tail(&content, lines)),
            None => Err(SessionError::NotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
