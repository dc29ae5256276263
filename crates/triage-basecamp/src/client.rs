// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Basecamp 3 API.
//!
//! Provides [`BasecampClient`] which attaches bearer tokens from a
//! [`TokenSource`] and retries exactly once after a 401 when the source can
//! refresh.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, LINK};
use reqwest::{Method, Response};
use serde::Serialize;
use tracing::{debug, warn};
use triage_core::{
    truncate_chars, CreatedTodo, NewTodo, Person, TicketingService, TodoTarget, TokenSource,
    TriageError,
};

/// Base URL for the Basecamp 3 API.
const API_BASE_URL: &str = "https://3.basecampapi.com";

/// Characters of an error body kept in `RemoteService` errors.
const ERROR_BODY_LIMIT: usize = 500;

/// Upper bound on `people.json` pages followed through `Link` headers.
const MAX_PEOPLE_PAGES: usize = 50;

#[derive(Serialize)]
struct SubscriptionChange<'a> {
    subscriptions: &'a [u64],
}

/// Basecamp API client bound to one account.
#[derive(Clone)]
pub struct BasecampClient {
    http: reqwest::Client,
    base_url: String,
    account_id: String,
    tokens: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for BasecampClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasecampClient")
            .field("base_url", &self.base_url)
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

impl BasecampClient {
    /// Creates a client for `account_id`.
    ///
    /// Basecamp rejects requests without a descriptive `User-Agent`, so one
    /// is always set.
    pub fn new(
        account_id: String,
        tokens: Arc<dyn TokenSource>,
        user_agent: &str,
    ) -> Result<Self, TriageError> {
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| TriageError::Config(format!("invalid User-Agent header value: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TriageError::Http {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base_url: API_BASE_URL.to_string(),
            account_id,
            tokens,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}{}", self.base_url, self.account_id, path)
    }

    /// Sends an authenticated request, refreshing the token once on a 401.
    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<Response, TriageError> {
        let mut retried = false;

        loop {
            let token = self.tokens.access_token(retried).await?;
            let mut request = self
                .http
                .request(method.clone(), url)
                .bearer_auth(token)
                .header(ACCEPT, "application/json");
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|e| TriageError::Http {
                message: format!("Basecamp request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

            let status = response.status();
            debug!(status = %status, %method, retried, "Basecamp response received");

            if status.is_success() {
                return Ok(response);
            }

            if status == reqwest::StatusCode::UNAUTHORIZED && !retried && self.tokens.can_refresh()
            {
                warn!("Basecamp answered 401, refreshing token and retrying once");
                retried = true;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::RemoteService {
                service: "basecamp",
                status: status.as_u16(),
                body: truncate_chars(&body, ERROR_BODY_LIMIT).to_string(),
            });
        }
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, TriageError> {
        response.json::<T>().await.map_err(|e| TriageError::Http {
            message: format!("failed to parse Basecamp response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl TicketingService for BasecampClient {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    async fn create_todo(
        &self,
        target: &TodoTarget,
        todo: &NewTodo,
    ) -> Result<CreatedTodo, TriageError> {
        let url = self.url(&format!(
            "/buckets/{}/todolists/{}/todos.json",
            target.project_id, target.todolist_id
        ));
        let response = self.send(Method::POST, &url, Some(todo)).await?;
        let created: CreatedTodo = Self::json(response).await?;
        debug!(todo_id = created.id, "created Basecamp to-do");
        Ok(created)
    }

    async fn add_subscribers(
        &self,
        project_id: &str,
        recording_id: u64,
        person_ids: &[u64],
    ) -> Result<(), TriageError> {
        if person_ids.is_empty() {
            return Ok(());
        }
        let url = self.url(&format!(
            "/buckets/{project_id}/recordings/{recording_id}/subscription.json"
        ));
        let change = SubscriptionChange {
            subscriptions: person_ids,
        };
        self.send(Method::PUT, &url, Some(&change)).await?;
        Ok(())
    }

    async fn list_people(&self) -> Result<Vec<Person>, TriageError> {
        let mut people = Vec::new();
        let mut next = Some(self.url("/people.json"));
        let mut pages = 0;

        while let Some(url) = next.take() {
            let response = self.send::<()>(Method::GET, &url, None).await?;
            next = next_page(&response);
            let page: Vec<Person> = Self::json(response).await?;
            people.extend(page);

            pages += 1;
            if pages >= MAX_PEOPLE_PAGES {
                warn!(pages, "stopped following people.json pagination");
                break;
            }
        }

        debug!(count = people.len(), "listed Basecamp people");
        Ok(people)
    }
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_page(response: &Response) -> Option<String> {
    let header = response.headers().get(LINK)?.to_str().ok()?;
    parse_next_link(header)
}

fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().replace(' ', "") == "rel=\"next\"");
        if !is_next {
            return None;
        }
        let target = target.trim();
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Hands out "token-N" where N counts forced refreshes.
    struct CountingTokens {
        refreshes: AtomicU32,
        refreshable: bool,
    }

    impl CountingTokens {
        fn new(refreshable: bool) -> Arc<Self> {
            Arc::new(Self {
                refreshes: AtomicU32::new(0),
                refreshable,
            })
        }
    }

    #[async_trait]
    impl TokenSource for CountingTokens {
        async fn access_token(&self, force_refresh: bool) -> Result<String, TriageError> {
            if force_refresh {
                self.refreshes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(format!("token-{}", self.refreshes.load(Ordering::SeqCst)))
        }

        fn can_refresh(&self) -> bool {
            self.refreshable
        }
    }

    fn client(server: &MockServer, tokens: Arc<CountingTokens>) -> BasecampClient {
        BasecampClient::new("999".into(), tokens, "triage-test (ops@example.com)")
            .unwrap()
            .with_base_url(server.uri())
    }

    fn target() -> TodoTarget {
        TodoTarget {
            project_id: "1".into(),
            todolist_id: "2".into(),
        }
    }

    fn todo() -> NewTodo {
        NewTodo {
            content: "Login fails".into(),
            description: "Reported by Ada in Slack".into(),
        }
    }

    #[tokio::test]
    async fn create_todo_posts_json_with_auth_and_agent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/999/buckets/1/todolists/2/todos.json"))
            .and(header("authorization", "Bearer token-0"))
            .and(header("user-agent", "triage-test (ops@example.com)"))
            .and(body_json(serde_json::json!({
                "content": "Login fails",
                "description": "Reported by Ada in Slack"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 42,
                "app_url": "https://3.basecamp.com/999/buckets/1/todos/42",
                "title": "Login fails"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = client(&server, CountingTokens::new(true))
            .create_todo(&target(), &todo())
            .await
            .unwrap();
        assert_eq!(created.id, 42);
        assert!(created.app_url.ends_with("/todos/42"));
    }

    #[tokio::test]
    async fn unauthorized_refreshes_once_and_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer token-0"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 7, "app_url": "https://example.com/7"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = CountingTokens::new(true);
        let created = client(&server, tokens.clone())
            .create_todo(&target(), &todo())
            .await
            .unwrap();
        assert_eq!(created.id, 7);
        assert_eq!(tokens.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_unauthorized_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server, CountingTokens::new(true))
            .create_todo(&target(), &todo())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn static_token_is_not_retried_on_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = CountingTokens::new(false);
        let result = client(&server, tokens.clone())
            .create_todo(&target(), &todo())
            .await;
        assert!(result.is_err());
        assert_eq!(tokens.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn server_error_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(2000)))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, CountingTokens::new(true))
            .create_todo(&target(), &todo())
            .await
            .unwrap_err();
        match err {
            TriageError::RemoteService {
                service,
                status,
                body,
            } => {
                assert_eq!(service, "basecamp");
                assert_eq!(status, 500);
                assert_eq!(body.chars().count(), 500);
            }
            other => panic!("expected RemoteService, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn add_subscribers_puts_person_ids() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/999/buckets/1/recordings/42/subscription.json"))
            .and(body_json(serde_json::json!({"subscriptions": [5, 6]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, CountingTokens::new(true))
            .add_subscribers("1", 42, &[5, 6])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn add_subscribers_skips_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        client(&server, CountingTokens::new(true))
            .add_subscribers("1", 42, &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_people_follows_next_link() {
        let server = MockServer::start().await;
        let next = format!("<{}/999/people.json?page=2>; rel=\"next\"", server.uri());
        Mock::given(method("GET"))
            .and(path("/999/people.json"))
            .and(wiremock::matchers::query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 2, "name": "Grace", "email_address": "grace@example.com"}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/999/people.json"))
            .and(wiremock::matchers::query_param_is_missing("page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next.as_str())
                    .set_body_json(serde_json::json!([
                        {"id": 1, "name": "Ada", "email_address": "ada@example.com",
                         "attachable_sgid": "sgid-ada"}
                    ])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let people = client(&server, CountingTokens::new(true))
            .list_people()
            .await
            .unwrap();
        let ids: Vec<u64> = people.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(people[0].attachable_sgid.as_deref(), Some("sgid-ada"));
    }

    #[test]
    fn parses_next_link_among_others() {
        let header = "<https://x/people.json?page=1>; rel=\"prev\", <https://x/people.json?page=3>; rel=\"next\"";
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://x/people.json?page=3")
        );
        assert_eq!(parse_next_link("<https://x>; rel=\"last\""), None);
    }
}
