// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake verifier for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{VerifierAdapter, VerifyTask};
use async_trait::async_trait;
use drover_core::Verdict;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Recorded verify call
#[derive(Debug, Clone)]
pub struct VerifyCall {
    pub task_name: String,
    pub output: String,
}

struct FakeVerifierState {
    verdicts: VecDeque<Verdict>,
    default: Verdict,
    summary: String,
    calls: Vec<VerifyCall>,
}

/// Fake verifier with a scripted verdict queue.
///
/// Each `verify` call pops the next scripted verdict; once the queue is
/// empty the default verdict repeats.
#[derive(Clone)]
pub struct FakeVerifier {
    inner: Arc<Mutex<FakeVerifierState>>,
}

impl Default for FakeVerifier {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeVerifierState {
                verdicts: VecDeque::new(),
                default: Verdict::new(false, "not verified", 0.5),
                summary: "Working...".to_string(),
                calls: Vec::new(),
            })),
        }
    }
}

impl FakeVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next verdict
    pub fn push_verdict(&self, verdict: Verdict) {
        self.inner.lock().verdicts.push_back(verdict);
    }

    /// Queue a pass/fail with fixed feedback
    pub fn push(&self, passed: bool, feedback: &str) {
        self.push_verdict(Verdict::new(passed, feedback, 0.9));
    }

    /// Verdict returned once the queue is empty
    pub fn set_default(&self, verdict: Verdict) {
        self.inner.lock().default = verdict;
    }

    pub fn set_summary(&self, summary: &str) {
        self.inner.lock().summary = summary.to_string();
    }

    pub fn calls(&self) -> Vec<VerifyCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }
}

#[async_trait]
impl VerifierAdapter for FakeVerifier {
    async fn verify(&self, task: &VerifyTask, output: &str) -> Verdict {
        let mut inner = self.inner.lock();
        inner.calls.push(VerifyCall {
            task_name: task.name.clone(),
            output: output.to_string(),
        });
        inner
            .verdicts
            .pop_front()
            .unwrap_or_else(|| inner.default.clone())
    }

    async fn status_summary(&self, _task_name: &str, _output: &str) -> String {
        self.inner.lock().summary.clone()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
