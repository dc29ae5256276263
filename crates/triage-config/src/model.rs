// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Triage bridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Triage configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TriageConfig {
    /// Bot behavior: trigger emoji, messages, logging.
    #[serde(default)]
    pub bot: BotConfig,

    /// Slack workspace credentials and events endpoint.
    #[serde(default)]
    pub slack: SlackConfig,

    /// OpenAI extraction settings, admission and retry policy.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Basecamp account, default target list, and OAuth credentials.
    #[serde(default)]
    pub basecamp: BasecampConfig,

    /// Channel-to-project binding storage.
    #[serde(default)]
    pub bindings: BindingsConfig,
}

/// Bot behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Reaction name (without colons) that triggers an extraction.
    #[serde(default = "default_trigger_emoji")]
    pub trigger_emoji: String,

    /// Text of the progress message posted when a run starts.
    #[serde(default = "default_working_message")]
    pub working_message: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            trigger_emoji: default_trigger_emoji(),
            working_message: default_working_message(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_trigger_emoji() -> String {
    "basecamp".to_string()
}

fn default_working_message() -> String {
    "Extracting issue to Basecamp…".to_string()
}

/// Slack workspace configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    /// Bot user OAuth token (`xoxb-…`). Required by `serve`.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Signing secret used to verify event deliveries. Required by `serve`.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// Address the events endpoint listens on.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Bot identity used to recognize the bot's own replies.
    /// When unset, it is discovered with `auth.test` at startup.
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            signing_secret: None,
            bind_address: default_bind_address(),
            bot_id: None,
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

/// OpenAI extraction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// OpenAI API key. Required by `serve`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chat completion model.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for extraction.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Inline extraction prompt. Overridden by `extraction_prompt_file` if both set.
    #[serde(default)]
    pub extraction_prompt: Option<String>,

    /// Path to a file containing the extraction prompt.
    #[serde(default)]
    pub extraction_prompt_file: Option<String>,

    /// Sliding-window cap on extraction calls per minute.
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,

    /// Consecutive failures that open the circuit breaker.
    #[serde(default = "default_circuit_breaker_failures")]
    pub circuit_breaker_failures: u32,

    /// Seconds the circuit stays open once tripped.
    #[serde(default = "default_circuit_breaker_seconds")]
    pub circuit_breaker_seconds: u64,

    /// Total attempts per extraction call, first attempt included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles for each further attempt.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            extraction_prompt: None,
            extraction_prompt_file: None,
            max_requests_per_minute: default_max_requests_per_minute(),
            circuit_breaker_failures: default_circuit_breaker_failures(),
            circuit_breaker_seconds: default_circuit_breaker_seconds(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_requests_per_minute() -> u32 {
    15
}

fn default_circuit_breaker_failures() -> u32 {
    5
}

fn default_circuit_breaker_seconds() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

/// Basecamp configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BasecampConfig {
    /// Basecamp account number. Required by `serve`.
    #[serde(default)]
    pub account_id: Option<String>,

    /// Default project (bucket) for channels without a binding.
    #[serde(default)]
    pub project_id: Option<String>,

    /// Default to-do list for channels without a binding.
    #[serde(default)]
    pub todolist_id: Option<String>,

    /// Static access token used when no token file exists.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Refresh token paired with `access_token`.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// OAuth client id. Refresh is only possible with id and secret set.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Redirect URI registered for the one-time authorization.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// File holding the persisted OAuth credential.
    #[serde(default = "default_token_file")]
    pub token_file: String,

    /// Subscribe every resolvable thread participant to the new to-do.
    #[serde(default)]
    pub add_participants_as_subscribers: bool,

    /// User-Agent sent to the Basecamp API, which requires one with contact info.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BasecampConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            project_id: None,
            todolist_id: None,
            access_token: None,
            refresh_token: None,
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            token_file: default_token_file(),
            add_participants_as_subscribers: false,
            user_agent: default_user_agent(),
        }
    }
}

fn default_token_file() -> String {
    "basecamp-tokens.json".to_string()
}

fn default_user_agent() -> String {
    concat!("triage/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Channel binding storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BindingsConfig {
    /// JSON file mapping channel ids to project and to-do list ids.
    #[serde(default = "default_bindings_path")]
    pub path: String,
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            path: default_bindings_path(),
        }
    }
}

fn default_bindings_path() -> String {
    "channel-bindings.json".to_string()
}

/// Treats empty strings (common with unset env placeholders) as absent.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
