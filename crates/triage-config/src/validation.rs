// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes:
//! policy ranges, non-empty paths, and the keys each command needs.

use std::net::SocketAddr;

use crate::diagnostic::ConfigError;
use crate::model::{non_empty, TriageConfig};

/// Lowest circuit breaker cooldown accepted, in seconds.
const MIN_CIRCUIT_SECONDS: u64 = 30;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every error instead of failing on the first one.
pub fn validate_config(config: &TriageConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let openai = &config.openai;

    if openai.max_requests_per_minute < 1 {
        errors.push(ConfigError::Validation {
            message: "openai.max_requests_per_minute must be at least 1".to_string(),
        });
    }

    if openai.circuit_breaker_failures < 1 {
        errors.push(ConfigError::Validation {
            message: "openai.circuit_breaker_failures must be at least 1".to_string(),
        });
    }

    if openai.circuit_breaker_seconds < MIN_CIRCUIT_SECONDS {
        errors.push(ConfigError::Validation {
            message: format!(
                "openai.circuit_breaker_seconds must be at least {MIN_CIRCUIT_SECONDS}, got {}",
                openai.circuit_breaker_seconds
            ),
        });
    }

    if openai.max_attempts < 1 {
        errors.push(ConfigError::Validation {
            message: "openai.max_attempts must be at least 1".to_string(),
        });
    }

    if !(0.0..=2.0).contains(&openai.temperature) {
        errors.push(ConfigError::Validation {
            message: format!(
                "openai.temperature must be between 0.0 and 2.0, got {}",
                openai.temperature
            ),
        });
    }

    if config.bot.trigger_emoji.trim().is_empty() || config.bot.trigger_emoji.contains(':') {
        errors.push(ConfigError::Validation {
            message: "bot.trigger_emoji must be a reaction name without colons".to_string(),
        });
    }

    if config.basecamp.token_file.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "basecamp.token_file must not be empty".to_string(),
        });
    }

    if config.bindings.path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "bindings.path must not be empty".to_string(),
        });
    }

    if config.slack.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ConfigError::Validation {
            message: format!(
                "slack.bind_address `{}` is not a valid socket address",
                config.slack.bind_address
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check the keys `triage serve` cannot run without.
///
/// Project and to-do list are only required as a pair: a channel binding can
/// stand in for them, but half a default target is a mistake.
pub fn validate_for_serve(config: &TriageConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let required = [
        ("slack.bot_token", &config.slack.bot_token),
        ("slack.signing_secret", &config.slack.signing_secret),
        ("openai.api_key", &config.openai.api_key),
        ("basecamp.account_id", &config.basecamp.account_id),
    ];
    for (key, value) in required {
        if non_empty(value).is_none() {
            errors.push(ConfigError::missing(key));
        }
    }

    let project = non_empty(&config.basecamp.project_id);
    let todolist = non_empty(&config.basecamp.todolist_id);
    match (project, todolist) {
        (Some(_), None) => errors.push(ConfigError::missing("basecamp.todolist_id")),
        (None, Some(_)) => errors.push(ConfigError::missing("basecamp.project_id")),
        _ => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check the keys `triage authorize` needs for the code exchange.
pub fn validate_for_authorize(config: &TriageConfig) -> Result<(), Vec<ConfigError>> {
    let errors: Vec<ConfigError> = [
        ("basecamp.client_id", &config.basecamp.client_id),
        ("basecamp.client_secret", &config.basecamp.client_secret),
        ("basecamp.redirect_uri", &config.basecamp.redirect_uri),
    ]
    .into_iter()
    .filter(|(_, value)| non_empty(value).is_none())
    .map(|(key, _)| ConfigError::missing(key))
    .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
