// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenAI chat completions API.
//!
//! Performs exactly one request per call. Retry and admission are decided by
//! the caller from the structured [`TriageError::Provider`] this client
//! returns.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use triage_core::{truncate_chars, CompletionRequest, ExtractionService, TriageError};

use crate::types::{ApiErrorResponse, ChatMessage, ChatRequest, ChatResponse};

/// Endpoint for chat completions.
const API_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Characters of an unparseable error body kept in the error message.
const ERROR_BODY_LIMIT: usize = 300;

/// OpenAI client configured for one model and temperature.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    model: String,
    temperature: f32,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a new client. The key is only ever written into a sensitive header.
    pub fn new(api_key: &SecretString, model: String, temperature: f32) -> Result<Self, TriageError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|e| TriageError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| TriageError::Http {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model,
            temperature,
            base_url: API_BASE_URL.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Overrides the endpoint URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl ExtractionService for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TriageError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_content,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TriageError::Provider {
                status: None,
                code: None,
                message: format!("HTTP request failed: {e}"),
                retry_after: None,
            })?;

        let status = response.status();
        debug!(status = %status, model = %self.model, "completion response received");

        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(parsed) => (
                    parsed.error.effective_code().map(str::to_string),
                    format!("OpenAI API returned {status}: {}", parsed.error.message),
                ),
                Err(_) => (
                    None,
                    format!(
                        "OpenAI API returned {status}: {}",
                        truncate_chars(&text, ERROR_BODY_LIMIT)
                    ),
                ),
            };
            return Err(TriageError::Provider {
                status: Some(status.as_u16()),
                code,
                message,
                retry_after,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| TriageError::Provider {
            status: Some(status.as_u16()),
            code: None,
            message: format!("failed to parse completion response: {e}"),
            retry_after: None,
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(TriageError::Provider {
                status: Some(status.as_u16()),
                code: None,
                message: "OpenAI returned empty content".into(),
                retry_after: None,
            });
        }
        Ok(content)
    }
}

/// Reads `retry-after-ms` (milliseconds) or `retry-after` (seconds).
///
/// Values too large to represent are treated as absent.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
    };

    if let Some(ms) = header("retry-after-ms") {
        if let Ok(delay) = Duration::try_from_secs_f64(ms / 1000.0) {
            return Some(delay);
        }
    }
    header("retry-after").and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}
