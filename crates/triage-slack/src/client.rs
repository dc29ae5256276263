// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack Web API client implementing [`ChatService`].
//!
//! Every Web API answer carries an `ok` flag; `ok: false` becomes a
//! [`TriageError::Chat`] naming the API method and Slack's error code.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use triage_core::{
    truncate_chars, ChannelId, ChatService, ChatUser, MessageId, ThreadMessage, TriageError,
    UserId,
};

/// Base URL for the Slack Web API.
const API_BASE_URL: &str = "https://slack.com/api";

#[derive(Deserialize)]
struct RepliesResponse {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ts: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    user: RawUser,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<RawProfile>,
}

#[derive(Deserialize)]
struct RawProfile {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct PermalinkResponse {
    #[serde(default)]
    permalink: Option<String>,
}

#[derive(Deserialize)]
struct AuthTestResponse {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    thread_ts: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct UpdateMessage<'a> {
    channel: &'a str,
    ts: &'a str,
    text: &'a str,
}

/// Identity of the bot token, as reported by `auth.test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: Option<String>,
    pub bot_id: Option<String>,
}

/// Slack Web API client authenticated with a bot token.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SlackClient {
    pub fn new(bot_token: &SecretString) -> Result<Self, TriageError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", bot_token.expose_secret()))
            .map_err(|e| TriageError::Config(format!("invalid bot token header value: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TriageError::Http {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Calls `auth.test` to learn which bot identity the token belongs to.
    pub async fn auth_test(&self) -> Result<BotIdentity, TriageError> {
        let response: AuthTestResponse = self.post("auth.test", &serde_json::json!({})).await?;
        Ok(BotIdentity {
            user_id: response.user_id,
            bot_id: response.bot_id,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        api_method: &str,
        params: &[(&str, &str)],
    ) -> Result<T, TriageError> {
        let url = Url::parse_with_params(&format!("{}/{api_method}", self.base_url), params)
            .map_err(|e| TriageError::Internal(format!("invalid Slack URL: {e}")))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(api_method, e))?;
        decode(api_method, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        api_method: &str,
        body: &B,
    ) -> Result<T, TriageError> {
        let response = self
            .http
            .post(format!("{}/{api_method}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(api_method, e))?;
        decode(api_method, response).await
    }
}

fn transport_error(api_method: &str, e: reqwest::Error) -> TriageError {
    TriageError::Http {
        message: format!("Slack {api_method} request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

async fn decode<T: DeserializeOwned>(api_method: &str, response: Response) -> Result<T, TriageError> {
    let status = response.status();
    debug!(status = %status, api_method, "Slack response received");

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TriageError::Chat {
            message: format!(
                "Slack {api_method} returned {status}: {}",
                truncate_chars(&body, 200)
            ),
            source: None,
        });
    }

    let value: serde_json::Value = response.json().await.map_err(|e| TriageError::Chat {
        message: format!("Slack {api_method} returned invalid JSON"),
        source: Some(Box::new(e)),
    })?;

    if value.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
        let code = value
            .get("error")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown_error");
        return Err(TriageError::Chat {
            message: format!("Slack {api_method} failed: {code}"),
            source: None,
        });
    }

    serde_json::from_value(value).map_err(|e| TriageError::Chat {
        message: format!("unexpected Slack {api_method} payload"),
        source: Some(Box::new(e)),
    })
}

#[async_trait]
impl ChatService for SlackClient {
    async fn thread_messages(
        &self,
        channel: &ChannelId,
        thread: &MessageId,
        limit: usize,
    ) -> Result<Vec<ThreadMessage>, TriageError> {
        let limit = limit.to_string();
        let response: RepliesResponse = self
            .get(
                "conversations.replies",
                &[
                    ("channel", channel.0.as_str()),
                    ("ts", thread.0.as_str()),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;

        Ok(response
            .messages
            .into_iter()
            .filter_map(|m| {
                Some(ThreadMessage {
                    id: MessageId(m.ts?),
                    user: m.user.map(UserId),
                    bot_id: m.bot_id,
                    text: m.text.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn post_reply(
        &self,
        channel: &ChannelId,
        thread: &MessageId,
        text: &str,
    ) -> Result<MessageId, TriageError> {
        let body = PostMessage {
            channel: &channel.0,
            thread_ts: &thread.0,
            text,
        };
        let response: PostMessageResponse = self.post("chat.postMessage", &body).await?;
        Ok(MessageId(response.ts))
    }

    async fn update_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        text: &str,
    ) -> Result<(), TriageError> {
        let body = UpdateMessage {
            channel: &channel.0,
            ts: &message.0,
            text,
        };
        let _: serde_json::Value = self.post("chat.update", &body).await?;
        Ok(())
    }

    async fn user_info(&self, user: &UserId) -> Result<ChatUser, TriageError> {
        let response: UserInfoResponse = self.get("users.info", &[("user", user.0.as_str())]).await?;
        let raw = response.user;
        let display_name = [raw.real_name.as_deref(), raw.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .unwrap_or(raw.id.as_str())
            .to_string();
        let email = raw
            .profile
            .and_then(|p| p.email)
            .filter(|e| !e.trim().is_empty());

        Ok(ChatUser {
            id: UserId(raw.id),
            display_name,
            email,
        })
    }

    async fn permalink(
        &self,
        channel: &ChannelId,
        message: &MessageId,
    ) -> Result<Option<String>, TriageError> {
        let response: PermalinkResponse = self
            .get(
                "chat.getPermalink",
                &[("channel", channel.0.as_str()), ("message_ts", message.0.as_str())],
            )
            .await?;
        Ok(response.permalink.filter(|p| !p.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SlackClient {
        SlackClient::new(&SecretString::from("xoxb-test".to_string()))
            .unwrap()
            .with_base_url(server.uri())
    }

    fn ok(body: serde_json::Value) -> ResponseTemplate {
        let mut body = body;
        body["ok"] = serde_json::Value::Bool(true);
        ResponseTemplate::new(200).set_body_json(body)
    }

    #[tokio::test]
    async fn thread_messages_reads_replies_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.replies"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(query_param("channel", "C1"))
            .and(query_param("ts", "100.1"))
            .and(query_param("limit", "200"))
            .respond_with(ok(serde_json::json!({
                "messages": [
                    {"ts": "100.1", "user": "U1", "text": "it broke"},
                    {"ts": "100.2", "bot_id": "B1", "text": "Extracting…"},
                    {"user": "U2", "text": "no ts, dropped"}
                ]
            })))
            .mount(&server)
            .await;

        let messages = client(&server)
            .thread_messages(&ChannelId("C1".into()), &MessageId("100.1".into()), 200)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].user, Some(UserId("U1".into())));
        assert_eq!(messages[1].bot_id.as_deref(), Some("B1"));
    }

    #[tokio::test]
    async fn post_reply_returns_new_ts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_json(serde_json::json!({
                "channel": "C1", "thread_ts": "100.1", "text": "working"
            })))
            .respond_with(ok(serde_json::json!({"ts": "100.5", "channel": "C1"})))
            .expect(1)
            .mount(&server)
            .await;

        let ts = client(&server)
            .post_reply(&ChannelId("C1".into()), &MessageId("100.1".into()), "working")
            .await
            .unwrap();
        assert_eq!(ts, MessageId("100.5".into()));
    }

    #[tokio::test]
    async fn not_ok_becomes_chat_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.update"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": false, "error": "message_not_found"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .update_message(&ChannelId("C1".into()), &MessageId("1.0".into()), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::Chat { .. }));
        assert!(err.to_string().contains("message_not_found"));
    }

    #[tokio::test]
    async fn user_info_prefers_real_name_and_keeps_email() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.info"))
            .and(query_param("user", "U1"))
            .respond_with(ok(serde_json::json!({
                "user": {"id": "U1", "name": "ada", "real_name": "Ada Lovelace",
                         "profile": {"email": "Ada@Example.com"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users.info"))
            .and(query_param("user", "U2"))
            .respond_with(ok(serde_json::json!({"user": {"id": "U2", "real_name": ""}})))
            .mount(&server)
            .await;

        let slack = client(&server);
        let ada = slack.user_info(&UserId("U1".into())).await.unwrap();
        assert_eq!(ada.display_name, "Ada Lovelace");
        assert_eq!(ada.email.as_deref(), Some("Ada@Example.com"));

        let anon = slack.user_info(&UserId("U2".into())).await.unwrap();
        assert_eq!(anon.display_name, "U2");
        assert_eq!(anon.email, None);
    }

    #[tokio::test]
    async fn permalink_and_auth_test() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat.getPermalink"))
            .and(query_param("message_ts", "100.1"))
            .respond_with(ok(serde_json::json!({
                "permalink": "https://acme.slack.com/archives/C1/p1001"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .respond_with(ok(serde_json::json!({"user_id": "UBOT", "bot_id": "B9"})))
            .mount(&server)
            .await;

        let slack = client(&server);
        let link = slack
            .permalink(&ChannelId("C1".into()), &MessageId("100.1".into()))
            .await
            .unwrap();
        assert_eq!(link.as_deref(), Some("https://acme.slack.com/archives/C1/p1001"));

        let identity = slack.auth_test().await.unwrap();
        assert_eq!(identity.bot_id.as_deref(), Some("B9"));
    }
}
