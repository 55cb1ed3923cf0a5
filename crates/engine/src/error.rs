// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use drover_adapters::SessionError;
use drover_core::TaskStatus;
use drover_storage::StoreError;
use thiserror::Error;

/// Errors surfaced by the task service, runners, and watchdog
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session name already in use: {0}")]
    SessionExists(String),

    #[error("cannot {op} a task in status {status}")]
    InvalidTransition {
        op: &'static str,
        status: TaskStatus,
    },

    #[error("another task already running on this session")]
    SessionBusy,

    #[error("task already running: {0}")]
    AlreadyRunning(String),

    #[error("{0} is not supported by this runner")]
    Unsupported(&'static str),

    #[error("could not send prompt to session {0}")]
    SendFailed(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
