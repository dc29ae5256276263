// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI adapter for the Triage bridge.
//!
//! [`OpenAiClient`] implements [`triage_core::ExtractionService`] with one
//! HTTP request per call; [`extract_issue`] layers the retry policy and the
//! output parser on top of any extraction service.

pub mod client;
pub mod extract;
pub mod types;

pub use client::OpenAiClient;
pub use extract::{
    extract_issue, parse_extraction_output, resolve_prompt, IssueDraft,
    DEFAULT_EXTRACTION_PROMPT,
};
