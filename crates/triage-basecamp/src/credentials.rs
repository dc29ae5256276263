// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON file persistence for the Basecamp OAuth credential.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};
use triage_core::{CredentialRecord, CredentialStore, TriageError};

/// Stores the credential as a pretty-printed JSON document.
///
/// When the file is missing or unreadable, `load` falls back to the record
/// built from configuration (a static access token and optional refresh
/// token with unknown expiry).
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    fallback: Option<CredentialRecord>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback: None,
        }
    }

    /// Sets the record returned when no usable file exists.
    pub fn with_fallback(mut self, fallback: Option<CredentialRecord>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, TriageError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token file, using configured token");
                return Ok(self.fallback.clone());
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token file read failed");
                return Ok(self.fallback.clone());
            }
        };

        match serde_json::from_str::<CredentialRecord>(&content) {
            Ok(record) if !record.access_token.is_empty() => Ok(Some(record)),
            Ok(_) => {
                warn!(path = %self.path.display(), "token file has an empty access_token");
                Ok(self.fallback.clone())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token file is not valid JSON");
                Ok(self.fallback.clone())
            }
        }
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), TriageError> {
        let json = serde_json::to_string_pretty(record).map_err(|e| TriageError::Storage {
            source: Box::new(e),
        })?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| TriageError::Storage {
                source: Box::new(e),
            })?;
        debug!(path = %self.path.display(), "saved Basecamp credential");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn env_record() -> CredentialRecord {
        CredentialRecord {
            access_token: "from-config".into(),
            refresh_token: Some("config-refresh".into()),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn missing_file_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("tokens.json"))
            .with_fallback(Some(env_record()));

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "from-config");
        assert!(loaded.expires_at.is_none());
    }

    #[tokio::test]
    async fn missing_file_without_fallback_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("tokens.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileCredentialStore::new(&path).with_fallback(Some(env_record()));
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "from-config");
    }

    #[tokio::test]
    async fn saved_file_wins_over_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = FileCredentialStore::new(&path).with_fallback(Some(env_record()));

        let record = CredentialRecord {
            access_token: "persisted".into(),
            refresh_token: Some("r2".into()),
            expires_at: Some(Utc.with_ymd_and_hms(2030, 5, 6, 7, 8, 9).unwrap()),
        };
        store.save(&record).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"expires_at\": \"2030-05-06T07:08:09Z\""));
        assert_eq!(store.load().await.unwrap(), Some(record));
    }
}
