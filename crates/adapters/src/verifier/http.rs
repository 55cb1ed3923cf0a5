// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenAI-compatible chat-completions verifier.
//!
//! Hard timeouts guard both entry points (60 s for verdicts, 15 s for
//! status summaries); any network, status, or parse failure degrades to
//! the pattern heuristic in [`super::fallback`].

use super::fallback::{fallback_summary, fallback_verdict};
use super::{VerifierAdapter, VerifierConfigSource, VerifierError, VerifyTask};
use async_trait::async_trait;
use drover_core::{parse_verdict, Verdict, VerifierConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wall-clock cap for a verification request
const VERIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// Wall-clock cap for a status-summary request
const SUMMARY_TIMEOUT: Duration = Duration::from_secs(15);

/// Only the tail of the terminal output is sent for judging
const OUTPUT_TAIL_CHARS: usize = 8_000;

/// Status summaries are clamped to this length
const SUMMARY_MAX_CHARS: usize = 100;

const VERIFY_SYSTEM_PROMPT: &str = "You are a task completion verifier. Respond ONLY with \
{\"passed\":bool,\"feedback\":string,\"confidence\":number 0..1}.";

const SUMMARY_SYSTEM_PROMPT: &str = "You summarize terminal output into a short progress phrase. \
Respond with a single phrase of at most 100 characters, no quotes.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// LLM-backed verifier with heuristic fallback
#[derive(Clone)]
pub struct LlmVerifier<P> {
    client: reqwest::Client,
    config: P,
}

impl<P: VerifierConfigSource> LlmVerifier<P> {
    pub fn new(config: P) -> Self {
        Self {
            client: reqwest::Client::builder().build().unwrap_or_default(),
            config,
        }
    }

    async fn chat(
        &self,
        config: &VerifierConfig,
        messages: Vec<ChatMessage>,
        timeout: Duration,
    ) -> Result<String, VerifierError> {
        let url = format!(
            "{}/chat/completions",
            config.api_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &config.model,
            max_tokens: config.max_tokens,
            messages,
        };

        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(&url)
                .bearer_auth(&config.api_key)
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| VerifierError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifierError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = tokio::time::timeout(timeout, response.json())
            .await
            .map_err(|_| VerifierError::Timeout)??;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| VerifierError::MalformedResponse("no choices".to_string()))
    }

    fn verify_messages(task: &VerifyTask, output: &str) -> Vec<ChatMessage> {
        let mut user = format!("Task name: {}\nTask prompt: {}\n", task.name, task.prompt);
        if let Some(criteria) = &task.verification_prompt {
            user.push_str(&format!("Verification criteria: {}\n", criteria));
        }
        user.push_str(&format!(
            "\nTerminal output:\n{}\n\nIs this task complete?",
            tail_chars(output, OUTPUT_TAIL_CHARS)
        ));

        vec![
            ChatMessage {
                role: "system",
                content: VERIFY_SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ]
    }
}

#[async_trait]
impl<P: VerifierConfigSource> VerifierAdapter for LlmVerifier<P> {
    async fn verify(&self, task: &VerifyTask, output: &str) -> Verdict {
        let config = self.config.load();
        if !config.is_usable() {
            tracing::debug!(task = %task.name, "verifier disabled, using fallback");
            return fallback_verdict(output);
        }

        match self
            .chat(&config, Self::verify_messages(task, output), VERIFY_TIMEOUT)
            .await
        {
            Ok(content) => match parse_verdict(&content) {
                Some(verdict) => {
                    tracing::info!(
                        task = %task.name,
                        passed = verdict.passed,
                        confidence = verdict.confidence,
                        "verifier verdict"
                    );
                    verdict
                }
                None => {
                    tracing::warn!(task = %task.name, "unparseable verifier response, using fallback");
                    fallback_verdict(output)
                }
            },
            Err(e) => {
                tracing::warn!(task = %task.name, error = %e, "verifier request failed, using fallback");
                fallback_verdict(output)
            }
        }
    }

    async fn status_summary(&self, task_name: &str, output: &str) -> String {
        let config = self.config.load();
        if !config.is_usable() {
            return fallback_summary(output);
        }

        let messages = vec![
            ChatMessage {
                role: "system",
                content: SUMMARY_SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: format!(
                    "Task: {}\n\nRecent terminal output:\n{}",
                    task_name,
                    tail_chars(output, OUTPUT_TAIL_CHARS)
                ),
            },
        ];

        match self.chat(&config, messages, SUMMARY_TIMEOUT).await {
            Ok(content) => content.trim().chars().take(SUMMARY_MAX_CHARS).collect(),
            Err(e) => {
                tracing::debug!(task = task_name, error = %e, "status summary failed, using fallback");
                fallback_summary(output)
            }
        }
    }
}

/// Last `n` characters of `s`, respecting char boundaries.
fn tail_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    if count <= n {
        return s.to_string();
    }
    s.chars().skip(count - n).collect()
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
