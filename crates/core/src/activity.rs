// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity state of a terminal session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a terminal session appears to be doing, derived from scrollback
/// change tracking plus prompt pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    /// Output changed recently; the agent is working
    Active,
    /// Output has been still long enough to act on
    Idle,
    /// Output is still and the tail looks like an interactive prompt
    WaitingForInput,
}

impl ActivityState {
    /// True when the session has quiesced (idle or prompting)
    pub fn is_quiescent(&self) -> bool {
        !matches!(self, ActivityState::Active)
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityState::Active => write!(f, "active"),
            ActivityState::Idle => write!(f, "idle"),
            ActivityState::WaitingForInput => write!(f, "waiting_for_input"),
        }
    }
}
