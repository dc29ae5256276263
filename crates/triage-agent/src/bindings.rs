// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel to-do list bindings stored as a JSON file.
//!
//! The file maps channel ids to `{"project_id": ..., "todolist_id": ...}`.
//! Lookups on the event path tolerate a missing or corrupt file; edits
//! from the CLI refuse to overwrite a file they cannot parse.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use triage_core::{ChannelId, TodoTarget, TriageError};

pub type BindingMap = BTreeMap<String, TodoTarget>;

#[derive(Debug, Clone)]
pub struct ChannelBindings {
    path: PathBuf,
}

impl ChannelBindings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All bindings. A missing or unreadable file reads as empty.
    pub async fn load(&self) -> BindingMap {
        match self.read().await {
            Ok(map) => map,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable channel bindings");
                BindingMap::new()
            }
        }
    }

    /// Target bound to `channel`, if both of its ids are set.
    pub async fn get(&self, channel: &ChannelId) -> Option<TodoTarget> {
        self.load()
            .await
            .remove(&channel.0)
            .filter(|t| !t.project_id.trim().is_empty() && !t.todolist_id.trim().is_empty())
    }

    pub async fn list(&self) -> Result<BindingMap, TriageError> {
        self.read().await
    }

    /// Binds `channel` to `target`, replacing any earlier binding.
    pub async fn set(&self, channel: &ChannelId, target: TodoTarget) -> Result<(), TriageError> {
        if target.project_id.trim().is_empty() || target.todolist_id.trim().is_empty() {
            return Err(TriageError::Config(
                "a binding needs both a project id and a to-do list id".into(),
            ));
        }
        let mut map = self.read().await?;
        map.insert(channel.0.clone(), target);
        self.write(&map).await
    }

    /// Removes the binding of `channel`. Returns whether one existed.
    pub async fn unset(&self, channel: &ChannelId) -> Result<bool, TriageError> {
        let mut map = self.read().await?;
        if map.remove(&channel.0).is_none() {
            return Ok(false);
        }
        self.write(&map).await?;
        Ok(true)
    }

    async fn read(&self) -> Result<BindingMap, TriageError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no channel bindings file");
                return Ok(BindingMap::new());
            }
            Err(e) => return Err(TriageError::Storage { source: Box::new(e) }),
        };
        if content.trim().is_empty() {
            return Ok(BindingMap::new());
        }
        serde_json::from_str(&content).map_err(|e| TriageError::Storage { source: Box::new(e) })
    }

    async fn write(&self, map: &BindingMap) -> Result<(), TriageError> {
        let json = serde_json::to_string_pretty(map)
            .map_err(|e| TriageError::Storage { source: Box::new(e) })?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| TriageError::Storage { source: Box::new(e) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(project: &str, list: &str) -> TodoTarget {
        TodoTarget {
            project_id: project.into(),
            todolist_id: list.into(),
        }
    }

    fn channel(id: &str) -> ChannelId {
        ChannelId(id.into())
    }

    #[tokio::test]
    async fn set_get_unset_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let bindings = ChannelBindings::new(dir.path().join("bindings.json"));

        bindings.set(&channel("C1"), target("10", "20")).await.unwrap();
        bindings.set(&channel("C2"), target("11", "21")).await.unwrap();
        assert_eq!(bindings.get(&channel("C1")).await, Some(target("10", "20")));
        assert_eq!(bindings.list().await.unwrap().len(), 2);

        assert!(bindings.unset(&channel("C1")).await.unwrap());
        assert!(!bindings.unset(&channel("C1")).await.unwrap());
        assert_eq!(bindings.get(&channel("C1")).await, None);
        assert_eq!(bindings.get(&channel("C2")).await, Some(target("11", "21")));
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bindings = ChannelBindings::new(dir.path().join("none.json"));
        assert!(bindings.load().await.is_empty());
        assert!(bindings.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_reads_empty_but_blocks_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings.json");
        std::fs::write(&path, "{not json").unwrap();
        let bindings = ChannelBindings::new(&path);

        assert_eq!(bindings.get(&channel("C1")).await, None);
        assert!(bindings.set(&channel("C1"), target("1", "2")).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[tokio::test]
    async fn accepts_camel_case_entries_and_skips_incomplete_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings.json");
        std::fs::write(
            &path,
            r#"{
                "C1": {"projectId": "10", "todolistId": "20"},
                "C2": {"project_id": "11", "todolist_id": ""}
            }"#,
        )
        .unwrap();
        let bindings = ChannelBindings::new(&path);

        assert_eq!(bindings.get(&channel("C1")).await, Some(target("10", "20")));
        assert_eq!(bindings.get(&channel("C2")).await, None);
    }

    #[tokio::test]
    async fn set_rejects_blank_ids() {
        let dir = tempfile::tempdir().unwrap();
        let bindings = ChannelBindings::new(dir.path().join("bindings.json"));
        assert!(matches!(
            bindings.set(&channel("C1"), target("10", " ")).await,
            Err(TriageError::Config(_))
        ));
    }
}
