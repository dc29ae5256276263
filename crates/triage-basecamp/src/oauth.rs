// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Launchpad (37signals) OAuth endpoint: refresh grant and authorization-code grant.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};
use triage_core::{truncate_chars, CredentialRecord, TriageError};

const LAUNCHPAD_BASE_URL: &str = "https://launchpad.37signals.com";
const TOKEN_PATH: &str = "/authorization/token";
const AUTHORIZE_PATH: &str = "/authorization/new";

/// Lifetime assumed when the endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 14 * 24 * 60 * 60;

/// Characters of an error body kept in `RefreshFailed`.
const ERROR_BODY_LIMIT: usize = 300;

/// Successful token endpoint answer.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl TokenGrant {
    /// Builds the record to persist. The previous refresh token is kept when
    /// the grant does not rotate it. A lifetime that cannot be represented
    /// as a timestamp falls back to the default lifetime.
    pub fn into_record(self, previous_refresh: Option<String>, now: DateTime<Utc>) -> CredentialRecord {
        let after = |secs: i64| TimeDelta::try_seconds(secs).and_then(|d| now.checked_add_signed(d));
        let expires_at = self
            .expires_in
            .and_then(|secs| {
                let at = after(secs);
                if at.is_none() {
                    warn!(expires_in = secs, "ignoring out-of-range token lifetime");
                }
                at
            })
            .or_else(|| after(DEFAULT_EXPIRES_IN_SECS));
        CredentialRecord {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at,
        }
    }
}

/// Client for the Launchpad token endpoint.
///
/// Only constructed when both client id and secret are configured; its
/// presence is what gives the token manager refresh capability.
#[derive(Clone)]
pub struct LaunchpadClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl fmt::Debug for LaunchpadClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchpadClient")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl LaunchpadClient {
    pub fn new(client_id: String, client_secret: SecretString) -> Result<Self, TriageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TriageError::Http {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base_url: LAUNCHPAD_BASE_URL.to_string(),
            client_id,
            client_secret,
        })
    }

    /// Overrides the Launchpad base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// URL the operator opens in a browser to authorize the integration.
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<Url, TriageError> {
        Url::parse_with_params(
            &format!("{}{AUTHORIZE_PATH}", self.base_url),
            [
                ("type", "web_server"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
            ],
        )
        .map_err(|e| TriageError::Config(format!("invalid authorization URL: {e}")))
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TriageError> {
        self.request_grant(&[
            ("type", "refresh"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ])
        .await
    }

    /// Exchanges an authorization code from the redirect for the first credential.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, TriageError> {
        self.request_grant(&[
            ("type", "web_server"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("redirect_uri", redirect_uri),
            ("code", code),
        ])
        .await
    }

    async fn request_grant(&self, params: &[(&str, &str)]) -> Result<TokenGrant, TriageError> {
        let url = Url::parse_with_params(&format!("{}{TOKEN_PATH}", self.base_url), params)
            .map_err(|e| TriageError::Config(format!("invalid token endpoint URL: {e}")))?;

        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| TriageError::RefreshFailed {
                status: None,
                message: format!("token endpoint unreachable: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(status = %status, "token endpoint responded");

        if !status.is_success() {
            return Err(TriageError::RefreshFailed {
                status: Some(status.as_u16()),
                message: format!("{status}: {}", truncate_chars(&body, ERROR_BODY_LIMIT)),
            });
        }

        let grant: TokenGrant =
            serde_json::from_str(&body).map_err(|e| TriageError::RefreshFailed {
                status: Some(status.as_u16()),
                message: format!("invalid token response: {e}"),
            })?;
        if grant.access_token.is_empty() {
            return Err(TriageError::RefreshFailed {
                status: Some(status.as_u16()),
                message: "token response has no access_token".into(),
            });
        }
        Ok(grant)
    }
}
