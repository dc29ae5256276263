// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock extraction service for deterministic testing.
//!
//! Replies are popped from a FIFO queue; each entry is either completion
//! text or an error. When the queue is empty a well-formed default reply is
//! returned.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use triage_core::{CompletionRequest, ExtractionService, TriageError};

/// Reply returned once the scripted queue is exhausted.
pub const DEFAULT_REPLY: &str =
    "TITLE: Mock issue\nDESCRIPTION: Reported by Mock User in Slack\n\nSomething is broken.";

pub struct MockExtraction {
    replies: Mutex<VecDeque<Result<String, TriageError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockExtraction {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock pre-loaded with successful replies.
    pub fn with_replies(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            ..Self::new()
        }
    }

    pub async fn push_reply(&self, text: &str) {
        self.replies.lock().await.push_back(Ok(text.to_string()));
    }

    /// Queue a provider failure with the given HTTP status and error code.
    pub async fn push_failure(&self, status: u16, code: Option<&str>) {
        self.replies.lock().await.push_back(Err(TriageError::Provider {
            status: Some(status),
            code: code.map(str::to_string),
            message: format!("mock provider returned {status}"),
            retry_after: None,
        }));
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

impl Default for MockExtraction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionService for MockExtraction {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TriageError> {
        self.requests.lock().await.push(request.clone());
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()))
    }
}
