// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access token lifecycle: proactive refresh near expiry, forced refresh after a 401.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use triage_core::{CredentialRecord, CredentialStore, TokenSource, TriageError};

use crate::oauth::LaunchpadClient;

/// Tokens expiring within this many seconds are refreshed before use.
pub const REFRESH_BUFFER_SECS: i64 = 5 * 60;

const AUTHORIZE_HINT: &str =
    "set basecamp.access_token or run `triage authorize` to create the token file";

/// Hands out valid Basecamp access tokens, refreshing through Launchpad.
///
/// Refresh capability needs client credentials (fixed at construction, by
/// passing a [`LaunchpadClient`]) and a refresh token in the loaded record.
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    endpoint: Option<LaunchpadClient>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, endpoint: Option<LaunchpadClient>) -> Self {
        Self {
            store,
            endpoint,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns an access token, refreshing when forced or when the stored one
    /// is near expiry (or of unknown age).
    pub async fn valid_token(&self, force_refresh: bool) -> Result<String, TriageError> {
        self.valid_token_at(force_refresh, Utc::now()).await
    }

    async fn valid_token_at(
        &self,
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> Result<String, TriageError> {
        // Concurrent callers wait here and then see the refreshed record.
        let _guard = self.refresh_lock.lock().await;

        let record = self
            .store
            .load()
            .await?
            .ok_or_else(|| TriageError::NoCredential {
                hint: AUTHORIZE_HINT.to_string(),
            })?;

        let (Some(endpoint), Some(refresh_token)) = (&self.endpoint, record.refresh_token.clone())
        else {
            if force_refresh {
                debug!("refresh requested but no refresh capability, reusing stored token");
            }
            return Ok(record.access_token);
        };

        if !force_refresh && !needs_refresh(&record, now) {
            return Ok(record.access_token);
        }

        match endpoint.refresh(&refresh_token).await {
            Ok(grant) => {
                let refreshed = grant.into_record(Some(refresh_token), now);
                self.store.save(&refreshed).await?;
                info!(expires_at = ?refreshed.expires_at, "refreshed Basecamp access token");
                Ok(refreshed.access_token)
            }
            Err(err) if record.expires_at.is_none() => {
                warn!(error = %err, "token refresh failed, reusing token of unknown expiry");
                Ok(record.access_token)
            }
            Err(err) => Err(err),
        }
    }
}

/// True when the record's expiry is unknown or falls within [`REFRESH_BUFFER_SECS`].
pub fn needs_refresh(record: &CredentialRecord, now: DateTime<Utc>) -> bool {
    let buffer = chrono::Duration::seconds(REFRESH_BUFFER_SECS);
    record
        .expires_at
        .is_none_or(|expires_at| expires_at - buffer <= now)
}

#[async_trait]
impl TokenSource for TokenManager {
    async fn access_token(&self, force_refresh: bool) -> Result<String, TriageError> {
        self.valid_token(force_refresh).await
    }

    fn can_refresh(&self) -> bool {
        self.endpoint.is_some()
    }
}

/// A fixed token with no refresh capability.
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self, _force_refresh: bool) -> Result<String, TriageError> {
        Ok(self.0.expose_secret().to_string())
    }

    fn can_refresh(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct MemoryStore {
        record: StdMutex<Option<CredentialRecord>>,
        saves: StdMutex<u32>,
    }

    impl MemoryStore {
        fn with(record: CredentialRecord) -> Arc<Self> {
            Arc::new(Self {
                record: StdMutex::new(Some(record)),
                saves: StdMutex::new(0),
            })
        }

        fn current(&self) -> Option<CredentialRecord> {
            self.record.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn load(&self) -> Result<Option<CredentialRecord>, TriageError> {
            Ok(self.current())
        }

        async fn save(&self, record: &CredentialRecord) -> Result<(), TriageError> {
            *self.record.lock().unwrap() = Some(record.clone());
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn record(expires_at: Option<DateTime<Utc>>) -> CredentialRecord {
        CredentialRecord {
            access_token: "old-access".into(),
            refresh_token: Some("old-refresh".into()),
            expires_at,
        }
    }

    fn endpoint(server: &MockServer) -> LaunchpadClient {
        LaunchpadClient::new("cid".into(), SecretString::from("secret".to_string()))
            .unwrap()
            .with_base_url(server.uri())
    }

    async fn mount_refresh(server: &MockServer, status: u16, expected_calls: u64) {
        let template = if status == 200 {
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_in": 1209600
            }))
        } else {
            ResponseTemplate::new(status).set_body_string("invalid_grant")
        };
        Mock::given(method("POST"))
            .and(path("/authorization/token"))
            .and(query_param("refresh_token", "old-refresh"))
            .respond_with(template)
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_refresh() {
        let server = MockServer::start().await;
        mount_refresh(&server, 200, 0).await;
        let store = MemoryStore::with(record(Some(Utc::now() + chrono::Duration::hours(1))));
        let manager = TokenManager::new(store.clone(), Some(endpoint(&server)));

        assert_eq!(manager.valid_token(false).await.unwrap(), "old-access");
        assert_eq!(*store.saves.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn token_inside_buffer_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        mount_refresh(&server, 200, 1).await;
        let now = Utc::now();
        let store = MemoryStore::with(record(Some(now + chrono::Duration::minutes(3))));
        let manager = TokenManager::new(store.clone(), Some(endpoint(&server)));

        assert_eq!(manager.valid_token_at(false, now).await.unwrap(), "new-access");
        let saved = store.current().unwrap();
        assert_eq!(saved.access_token, "new-access");
        assert_eq!(saved.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(saved.expires_at, Some(now + chrono::Duration::seconds(1209600)));
    }

    #[tokio::test]
    async fn refresh_with_out_of_range_lifetime_uses_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authorization/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "expires_in": i64::MAX
            })))
            .expect(1)
            .mount(&server)
            .await;
        let now = Utc::now();
        let store = MemoryStore::with(record(None));
        let manager = TokenManager::new(store.clone(), Some(endpoint(&server)));

        assert_eq!(manager.valid_token_at(false, now).await.unwrap(), "new-access");
        assert_eq!(
            store.current().unwrap().expires_at,
            Some(now + chrono::Duration::seconds(crate::oauth::DEFAULT_EXPIRES_IN_SECS))
        );
    }

    #[tokio::test]
    async fn unknown_expiry_triggers_refresh() {
        let server = MockServer::start().await;
        mount_refresh(&server, 200, 1).await;
        let store = MemoryStore::with(record(None));
        let manager = TokenManager::new(store, Some(endpoint(&server)));

        assert_eq!(manager.valid_token(false).await.unwrap(), "new-access");
    }

    #[tokio::test]
    async fn forced_refresh_ignores_expiry() {
        let server = MockServer::start().await;
        mount_refresh(&server, 200, 1).await;
        let store = MemoryStore::with(record(Some(Utc::now() + chrono::Duration::days(7))));
        let manager = TokenManager::new(store, Some(endpoint(&server)));

        assert_eq!(manager.valid_token(true).await.unwrap(), "new-access");
    }

    #[tokio::test]
    async fn no_client_credentials_means_no_refresh() {
        let store = MemoryStore::with(record(Some(Utc::now() - chrono::Duration::hours(1))));
        let manager = TokenManager::new(store, None);

        assert!(!manager.can_refresh());
        assert_eq!(manager.valid_token(true).await.unwrap(), "old-access");
    }

    #[tokio::test]
    async fn missing_refresh_token_returns_stored_token() {
        let server = MockServer::start().await;
        mount_refresh(&server, 200, 0).await;
        let mut without_refresh = record(None);
        without_refresh.refresh_token = None;
        let manager = TokenManager::new(MemoryStore::with(without_refresh), Some(endpoint(&server)));

        assert_eq!(manager.valid_token(true).await.unwrap(), "old-access");
    }

    #[tokio::test]
    async fn no_record_is_no_credential() {
        let manager = TokenManager::new(Arc::new(MemoryStore::default()), None);
        let err = manager.valid_token(false).await.unwrap_err();
        assert!(matches!(err, TriageError::NoCredential { .. }));
        assert!(err.to_string().contains("triage authorize"));
    }

    #[tokio::test]
    async fn failed_refresh_reuses_token_of_unknown_expiry() {
        let server = MockServer::start().await;
        mount_refresh(&server, 401, 1).await;
        let manager = TokenManager::new(MemoryStore::with(record(None)), Some(endpoint(&server)));

        assert_eq!(manager.valid_token(false).await.unwrap(), "old-access");
    }

    #[tokio::test]
    async fn failed_refresh_of_expiring_token_propagates() {
        let server = MockServer::start().await;
        mount_refresh(&server, 401, 1).await;
        let store = MemoryStore::with(record(Some(Utc::now() + chrono::Duration::minutes(1))));
        let manager = TokenManager::new(store, Some(endpoint(&server)));

        let err = manager.valid_token(false).await.unwrap_err();
        assert!(matches!(err, TriageError::RefreshFailed { status: Some(401), .. }));
    }

    #[test]
    fn needs_refresh_boundary() {
        let now = Utc::now();
        let buffer = chrono::Duration::seconds(REFRESH_BUFFER_SECS);
        assert!(needs_refresh(&record(None), now));
        assert!(needs_refresh(&record(Some(now + buffer)), now));
        assert!(!needs_refresh(
            &record(Some(now + buffer + chrono::Duration::seconds(1))),
            now
        ));
    }

    #[tokio::test]
    async fn static_token_never_refreshes() {
        let source = StaticToken::new(SecretString::from("fixed".to_string()));
        assert!(!source.can_refresh());
        assert_eq!(source.access_token(true).await.unwrap(), "fixed");
    }
}
