// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic pattern heuristic used when the LLM verifier is disabled
//! or failing. Scans the last 20 lines of output for interactive prompts,
//! failure tokens, and success tokens.

use drover_core::Verdict;
use regex::Regex;
use std::sync::OnceLock;

/// Lines of output the heuristic considers
const TAIL_LINES: usize = 20;

fn waiting_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"\?\s*$",
            r"(?i)\(y/n\)",
            r"\[Y/n\]",
            r"\[y/N\]",
            r"(?i)press any key",
            r"(?i)continue\?",
            r"(?i)enter .*:",
            r"(?i)password:",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn failure_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)error:",
            r"(?i)\bfailed\b",
            r"(?i)\bexception\b",
            r"(?i)\bfatal\b",
            r"(?i)\bpanic\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn success_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\bsuccess\b",
            r"(?i)\bcomplete[d]?\b",
            r"(?i)\bdone\b",
            r"(?i)\bfinished\b",
            r"(?i)\bpassed\b",
            r"\bOK\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join("\n")
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    text.lines()
        .any(|line| patterns.iter().any(|p| p.is_match(line)))
}

/// Heuristic verdict over the output tail.
pub(crate) fn fallback_verdict(output: &str) -> Verdict {
    let tail = tail(output);
    let waiting = any_match(waiting_patterns(), &tail);
    let failure = any_match(failure_patterns(), &tail);
    let success = any_match(success_patterns(), &tail);

    if waiting {
        Verdict::new(false, "waiting for input", 0.7)
    } else if failure && !success {
        Verdict::new(false, "failure indicators in output", 0.6)
    } else if success && !failure {
        Verdict::new(true, "success indicators in output", 0.6)
    } else {
        Verdict::new(false, "unable to determine", 0.3)
    }
}

/// The same table collapsed to fixed progress phrases.
pub(crate) fn fallback_summary(output: &str) -> String {
    let tail = tail(output);
    let waiting = any_match(waiting_patterns(), &tail);
    let failure = any_match(failure_patterns(), &tail);
    let success = any_match(success_patterns(), &tail);

    if waiting {
        "Waiting for input...".to_string()
    } else if failure && !success {
        "Error encountered...".to_string()
    } else if success && !failure {
        "Completed...".to_string()
    } else {
        "Working...".to_string()
    }
}

#[cfg(test)]
#[path = "fallback_tests.rs"]
mod tests;
