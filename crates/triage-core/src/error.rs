// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Triage bridge.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Triage service traits and the pipeline.
#[derive(Debug, Error)]
pub enum TriageError {
    /// Configuration errors (missing keys, invalid values, unreadable prompt files).
    #[error("configuration error: {0}")]
    Config(String),

    /// No ticketing credential is stored and no fallback token is configured.
    #[error("no ticketing credential available: {hint}")]
    NoCredential { hint: String },

    /// The token endpoint rejected a refresh or code exchange.
    #[error("token refresh failed: {message}")]
    RefreshFailed {
        status: Option<u16>,
        message: String,
    },

    /// A remote API answered with a non-success status.
    #[error("{service} API returned {status}: {body}")]
    RemoteService {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Raw failure from the extraction service, before retry classification.
    #[error("extraction service error: {message}")]
    Provider {
        status: Option<u16>,
        code: Option<String>,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The extraction account has no remaining allowance. Never retried.
    #[error("extraction quota exhausted: {message}")]
    QuotaExhausted { message: String },

    /// The extraction service kept rate limiting after all attempts.
    #[error("extraction service rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Every status reporting strategy failed.
    #[error("status report failed: {message}")]
    StatusReportFailed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Chat service errors (API `ok: false`, malformed payloads).
    #[error("chat service error: {message}")]
    Chat {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transport-level HTTP failures (connect, timeout, body decode).
    #[error("http error: {message}")]
    Http {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local persistence errors (credential file, channel bindings).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TriageError {
    /// HTTP status carried by the error, when the failure came from a remote answer.
    pub fn status(&self) -> Option<u16> {
        match self {
            TriageError::RemoteService { status, .. } => Some(*status),
            TriageError::Provider { status, .. } | TriageError::RefreshFailed { status, .. } => {
                *status
            }
            _ => None,
        }
    }

    /// True for a 401 from a remote API.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Truncates `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
