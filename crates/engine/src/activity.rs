// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity detection for terminal sessions.
//!
//! A state machine, not a pattern search: agents emit sporadic output
//! during long operations, so "is it done" cannot be read off a single
//! capture. `poll` hashes the recent scrollback and timestamps changes;
//! `classify` turns the silence duration into `active`/`idle`, and only
//! consults the prompt pattern table once the session has been quiet
//! long enough that an interactive prompt is plausible.

use crate::config::Tunables;
use drover_adapters::TerminalAdapter;
use drover_core::{ActivityState, Clock};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Lines hashed per poll
const POLL_LINES: u32 = 15;

/// Lines captured for the waiting-prompt check
const PROMPT_CAPTURE_LINES: u32 = 5;

/// Only the last few lines can be an interactive prompt
const PROMPT_TAIL_LINES: usize = 3;

/// Patterns that mark a quiet session as waiting for input.
fn waiting_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Generic interactive prompts
            r"\?\s*$",
            r"(?i)\(y/n\)",
            r"\[Y/n\]",
            r"\[y/N\]",
            r"(?i)press any key",
            r"(?i)continue\?",
            r"(?i)enter .*:",
            r"(?i)password:",
            // Agent-specific confirmation prompts
            r"Do you want to proceed",
            r"Would you like me to",
            r"Should I continue",
            r"May I make this change",
            r"Shall I proceed",
            r"Allow this action",
            r"Approve the following",
            r"\[allow\]",
            r"\[deny\]",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    last_output_at: Instant,
    last_hash: u64,
}

/// Tracks output-change samples per terminal session
pub struct ActivityMonitor<T, C: Clock> {
    terminal: T,
    clock: C,
    tunables: Arc<Tunables>,
    samples: Mutex<HashMap<String, Sample>>,
}

impl<T: TerminalAdapter, C: Clock> ActivityMonitor<T, C> {
    pub fn new(terminal: T, clock: C, tunables: Arc<Tunables>) -> Self {
        Self {
            terminal,
            clock,
            tunables,
            samples: Mutex::new(HashMap::new()),
        }
    }

    /// Capture recent output and record whether it changed.
    pub async fn poll(&self, session_name: &str) {
        let Ok(Some(content)) = self.terminal.capture_recent(session_name, POLL_LINES).await
        else {
            return;
        };

        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        let hash = hasher.finish();

        let now = self.clock.now();
        let mut samples = self.samples.lock();
        match samples.entry(session_name.to_string()) {
            Entry::Occupied(mut occupied) => {
                let sample = occupied.get_mut();
                if sample.last_hash != hash {
                    sample.last_hash = hash;
                    sample.last_output_at = now;
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Sample {
                    last_output_at: now,
                    last_hash: hash,
                });
            }
        }
    }

    /// Classify the session from its silence duration and prompt tail.
    pub async fn classify(&self, session_name: &str) -> ActivityState {
        let last_output_at = {
            let samples = self.samples.lock();
            match samples.get(session_name) {
                Some(sample) => sample.last_output_at,
                None => return ActivityState::Idle,
            }
        };

        let silent_for = self.clock.now().saturating_duration_since(last_output_at);
        if silent_for < self.tunables.active_idle_threshold {
            return ActivityState::Active;
        }

        if silent_for >= self.tunables.waiting_threshold {
            if let Ok(Some(capture)) = self
                .terminal
                .capture_recent(session_name, PROMPT_CAPTURE_LINES)
                .await
            {
                if tail_matches_prompt(&capture) {
                    return ActivityState::WaitingForInput;
                }
            }
        }

        ActivityState::Idle
    }

    /// How long the session has been silent, if it has ever been sampled.
    pub fn idle_for(&self, session_name: &str) -> Option<Duration> {
        let samples = self.samples.lock();
        let sample = samples.get(session_name)?;
        Some(
            self.clock
                .now()
                .saturating_duration_since(sample.last_output_at),
        )
    }

    /// Drop the sample for a session (when a task releases it).
    pub fn forget(&self, session_name: &str) {
        self.samples.lock().remove(session_name);
    }
}

/// True when any of the last lines looks like an interactive prompt.
fn tail_matches_prompt(capture: &str) -> bool {
    let lines: Vec<&str> = capture
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(PROMPT_TAIL_LINES);
    lines[start..]
        .iter()
        .any(|line| waiting_patterns().iter().any(|p| p.is_match(line)))
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
