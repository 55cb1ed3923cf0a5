// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verification verdicts and verifier configuration.
//!
//! The verifier LLM is asked to respond with a single JSON object; in
//! practice the content often arrives wrapped in prose or code fences, so
//! [`parse_verdict`] extracts the first balanced JSON object it can find
//! and falls back to a loose scan for `"passed": true`.

use serde::{Deserialize, Serialize};

/// Result of asking the verifier whether a task is complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    #[serde(default)]
    pub feedback: String,
    /// Confidence in [0, 1]; clamped on construction
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

impl Verdict {
    pub fn new(passed: bool, feedback: impl Into<String>, confidence: f32) -> Self {
        Self {
            passed,
            feedback: feedback.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Clamp confidence into [0, 1] (applied after deserialization).
    pub fn clamped(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}

/// Relaxed wire shape: tolerate missing fields from the model.
#[derive(Deserialize)]
struct VerdictWire {
    passed: bool,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    confidence: Option<f32>,
}

impl From<VerdictWire> for Verdict {
    fn from(wire: VerdictWire) -> Self {
        Verdict {
            passed: wire.passed,
            feedback: wire.feedback,
            confidence: wire.confidence.unwrap_or_else(default_confidence),
        }
        .clamped()
    }
}

/// Parse a verdict out of LLM response content.
///
/// Tries the first balanced `{…}` object in the content, then a loose scan
/// for `"passed": true`. Returns `None` when neither yields a verdict.
pub fn parse_verdict(content: &str) -> Option<Verdict> {
    if let Some(json) = first_json_object(content) {
        if let Ok(wire) = serde_json::from_str::<VerdictWire>(json) {
            return Some(wire.into());
        }
    }

    // Loose scan: some models emit the fields without valid JSON framing
    let collapsed: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.contains("\"passed\": true") || collapsed.contains("\"passed\":true") {
        return Some(Verdict::new(true, "", default_confidence()));
    }

    None
}

/// Extract the first balanced JSON object from text, string-aware.
fn first_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Configuration for the LLM verifier, persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    pub enabled: bool,
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 500,
        }
    }
}

impl VerifierConfig {
    /// True when verification should go to the LLM endpoint at all
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }
}

#[cfg(test)]
#[path = "verify_tests.rs"]
mod tests;
