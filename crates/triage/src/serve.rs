// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `triage serve` command implementation.
//!
//! Wires the Slack, OpenAI, and Basecamp adapters into a [`Pipeline`] and
//! serves the Events API endpoint. Each verified trigger reaction runs the
//! pipeline on its own task; the HTTP answer does not wait for it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::json;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use triage_agent::{ChannelBindings, Pipeline, PipelineSettings};
use triage_basecamp::{BasecampClient, FileCredentialStore, LaunchpadClient, TokenManager};
use triage_config::model::non_empty;
use triage_config::TriageConfig;
use triage_core::{CredentialRecord, TodoTarget, TriageError};
use triage_openai::{resolve_prompt, OpenAiClient};
use triage_resilience::{AdmissionController, AdmissionPolicy, RetryPolicy};
use triage_slack::{verify_signature, Envelope, Event, SlackClient};

use crate::shutdown;

/// Time given to reactions in flight after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";
const RETRY_HEADER: &str = "x-slack-retry-num";

/// Shared state of the events endpoint.
#[derive(Clone)]
pub struct EventsState {
    pub signing_secret: Arc<SecretString>,
    pub trigger_emoji: Arc<str>,
    pub pipeline: Arc<Pipeline>,
    pub tasks: TaskTracker,
}

pub fn router(state: EventsState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .with_state(state)
}

/// Runs the `triage serve` command until SIGINT or SIGTERM.
pub async fn run_serve(config: TriageConfig) -> Result<(), TriageError> {
    crate::init_tracing(&config);
    info!("starting triage serve");

    let slack = Arc::new(SlackClient::new(&secret(&config.slack.bot_token, "slack.bot_token")?)?);
    let bot_id = match non_empty(&config.slack.bot_id) {
        Some(id) => Some(id.to_string()),
        None => match slack.auth_test().await {
            Ok(identity) => {
                info!(bot_id = ?identity.bot_id, user_id = ?identity.user_id, "resolved bot identity");
                identity.bot_id
            }
            Err(err) => {
                warn!(error = %err, "auth.test failed, treating any bot reply as ours");
                None
            }
        },
    };

    let pipeline = build_pipeline(&config, slack, bot_id)?;
    let state = EventsState {
        signing_secret: Arc::new(secret(&config.slack.signing_secret, "slack.signing_secret")?),
        trigger_emoji: Arc::from(config.bot.trigger_emoji.as_str()),
        pipeline: Arc::new(pipeline),
        tasks: TaskTracker::new(),
    };

    let addr = &config.slack.bind_address;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TriageError::Http {
            message: format!("failed to bind events endpoint to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;
    info!(
        address = %addr,
        emoji = %config.bot.trigger_emoji,
        "listening for Slack events on /slack/events"
    );

    let cancel = shutdown::install_signal_handler();
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| TriageError::Http {
            message: format!("events server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    shutdown::drain_tasks(&state.tasks, DRAIN_TIMEOUT).await;
    info!("triage serve stopped");
    Ok(())
}

fn build_pipeline(
    config: &TriageConfig,
    slack: Arc<SlackClient>,
    bot_id: Option<String>,
) -> Result<Pipeline, TriageError> {
    let openai = &config.openai;
    let prompt = resolve_prompt(
        non_empty(&openai.extraction_prompt),
        non_empty(&openai.extraction_prompt_file).map(Path::new),
    )?;
    let extraction = OpenAiClient::new(
        &secret(&openai.api_key, "openai.api_key")?,
        openai.model.clone(),
        openai.temperature,
    )?;

    let basecamp = &config.basecamp;
    let tokens = Arc::new(token_manager(config)?);
    let ticketing = BasecampClient::new(
        required(&basecamp.account_id, "basecamp.account_id")?.to_string(),
        tokens,
        &basecamp.user_agent,
    )?;

    let admission = AdmissionController::new(AdmissionPolicy {
        max_per_minute: openai.max_requests_per_minute,
        circuit_failures: openai.circuit_breaker_failures,
        circuit_cooldown: Duration::from_secs(openai.circuit_breaker_seconds),
    });
    let retry = RetryPolicy {
        max_attempts: openai.max_attempts,
        initial_backoff: Duration::from_millis(openai.initial_backoff_ms),
        ..RetryPolicy::default()
    };

    let default_target = match (non_empty(&basecamp.project_id), non_empty(&basecamp.todolist_id)) {
        (Some(project), Some(todolist)) => Some(TodoTarget {
            project_id: project.to_string(),
            todolist_id: todolist.to_string(),
        }),
        _ => None,
    };
    let settings = PipelineSettings {
        working_message: config.bot.working_message.clone(),
        extraction_prompt: prompt,
        default_target,
        add_participants_as_subscribers: basecamp.add_participants_as_subscribers,
        bot_id,
    };

    info!(model = %extraction.model(), "pipeline ready");
    Ok(Pipeline::new(
        slack,
        Arc::new(extraction),
        Arc::new(ticketing),
        Arc::new(admission),
        retry,
        settings,
    )
    .with_bindings(ChannelBindings::new(&config.bindings.path)))
}

/// Token manager over the credential file. Configured tokens are the
/// fallback; refresh needs both client id and secret.
pub(crate) fn token_manager(config: &TriageConfig) -> Result<TokenManager, TriageError> {
    let basecamp = &config.basecamp;
    let fallback = non_empty(&basecamp.access_token).map(|token| CredentialRecord {
        access_token: token.to_string(),
        refresh_token: non_empty(&basecamp.refresh_token).map(str::to_string),
        expires_at: None,
    });
    let store = FileCredentialStore::new(&basecamp.token_file).with_fallback(fallback);
    let endpoint = launchpad(config)?;
    if endpoint.is_none() {
        debug!("no Basecamp client credentials, token refresh disabled");
    }
    Ok(TokenManager::new(Arc::new(store), endpoint))
}

/// Launchpad client, when client id and secret are both configured.
pub(crate) fn launchpad(config: &TriageConfig) -> Result<Option<LaunchpadClient>, TriageError> {
    let basecamp = &config.basecamp;
    match (non_empty(&basecamp.client_id), non_empty(&basecamp.client_secret)) {
        (Some(id), Some(client_secret)) => Ok(Some(LaunchpadClient::new(
            id.to_string(),
            SecretString::from(client_secret.to_string()),
        )?)),
        _ => Ok(None),
    }
}

pub(crate) fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, TriageError> {
    non_empty(value).ok_or_else(|| TriageError::Config(format!("{key} is not set")))
}

fn secret(value: &Option<String>, key: &str) -> Result<SecretString, TriageError> {
    required(value, key).map(|v| SecretString::from(v.to_string()))
}

/// `POST /slack/events`.
async fn slack_events(
    State(state): State<EventsState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let timestamp = header_str(&headers, TIMESTAMP_HEADER);
    let signature = header_str(&headers, SIGNATURE_HEADER);
    let now = chrono::Utc::now().timestamp();
    if let Err(err) = verify_signature(&state.signing_secret, timestamp, &body, signature, now) {
        warn!(error = %err, "rejected Slack delivery");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, "malformed Slack delivery");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        Envelope::UrlVerification { challenge } => {
            info!("answered Slack URL verification");
            Json(json!({ "challenge": challenge })).into_response()
        }
        Envelope::EventCallback { event, event_id } => {
            if let Some(retry) = headers.get(RETRY_HEADER) {
                debug!(event_id = ?event_id, retry = ?retry, "ignoring redelivered event");
                return StatusCode::OK.into_response();
            }
            if let Event::ReactionAdded(reaction) = event {
                if let Some((channel, thread)) = reaction.trigger_target(&state.trigger_emoji) {
                    info!(event_id = ?event_id, channel = %channel, thread = %thread, "trigger reaction received");
                    let pipeline = Arc::clone(&state.pipeline);
                    state.tasks.spawn(async move {
                        pipeline.handle_reaction(channel, thread).await;
                    });
                }
            }
            StatusCode::OK.into_response()
        }
        Envelope::Other => StatusCode::OK.into_response(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
