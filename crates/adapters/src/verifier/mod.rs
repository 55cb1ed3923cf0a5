// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task-completion verifier adapters.
//!
//! The verifier is an oracle: given a task description and terminal
//! output, decide whether the task is done. The real implementation asks
//! an OpenAI-compatible chat endpoint; when that is disabled or failing,
//! a deterministic pattern heuristic answers instead, so `verify` itself
//! never fails.

mod fallback;
mod http;

pub use http::LlmVerifier;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeVerifier, VerifyCall};

use async_trait::async_trait;
use drover_core::{Task, Verdict, VerifierConfig};
use thiserror::Error;

/// Errors from the verifier endpoint (absorbed into the fallback path)
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("request timed out")]
    Timeout,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint returned status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// The slice of a task the verifier needs
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyTask {
    pub name: String,
    pub prompt: String,
    /// Custom judging criteria, when the task carries one
    pub verification_prompt: Option<String>,
}

impl VerifyTask {
    pub fn from_task(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            prompt: task.prompt.clone(),
            verification_prompt: task.verification_prompt.clone(),
        }
    }
}

/// Supplies the current verifier configuration.
///
/// The engine implements this over the store with a 30 s cache that is
/// invalidated on config writes.
pub trait VerifierConfigSource: Clone + Send + Sync + 'static {
    fn load(&self) -> VerifierConfig;
}

/// Oracle for task completion
#[async_trait]
pub trait VerifierAdapter: Clone + Send + Sync + 'static {
    /// Judge whether the task is complete. Never fails: endpoint trouble
    /// degrades to the pattern heuristic.
    async fn verify(&self, task: &VerifyTask, output: &str) -> Verdict;

    /// Short human progress phrase (at most 100 characters).
    async fn status_summary(&self, task_name: &str, output: &str) -> String;
}
