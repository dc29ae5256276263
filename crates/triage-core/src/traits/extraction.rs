// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language-model completion surface used for issue extraction.

use async_trait::async_trait;

use crate::error::TriageError;

/// A single completion request: system instruction plus user content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_content: String,
}

/// Adapter for the extraction service.
///
/// Failures should be reported as [`TriageError::Provider`] carrying the HTTP
/// status and the machine-readable error code so the retry controller can
/// classify them.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Sends one completion request and returns the trimmed response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TriageError>;
}
