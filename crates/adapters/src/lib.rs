// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-adapters: boundary adapters for the drover supervisor.
//!
//! Two seams to the outside world: the terminal multiplexer (tmux, driven
//! one subprocess per call) and the verifier LLM endpoint (OpenAI-style
//! chat completions). Both are traits with real and fake implementations;
//! fakes are exported behind the `test-support` feature.

pub mod terminal;
pub mod verifier;

pub use terminal::{SessionError, TerminalAdapter, TmuxTerminal};
pub use verifier::{LlmVerifier, VerifierAdapter, VerifierConfigSource, VerifierError, VerifyTask};

#[cfg(any(test, feature = "test-support"))]
pub use terminal::{FakeTerminal, TerminalCall};
#[cfg(any(test, feature = "test-support"))]
pub use verifier::{FakeVerifier, VerifyCall};
