// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticketing service surface: to-do creation, subscriptions, people listing.

use async_trait::async_trait;

use crate::error::TriageError;
use crate::types::{CreatedTodo, NewTodo, Person, TodoTarget};

#[async_trait]
pub trait TicketingService: Send + Sync {
    /// Account the client is bound to. Used as the people cache key.
    fn account_id(&self) -> &str;

    /// Creates a to-do in the given project and list.
    async fn create_todo(
        &self,
        target: &TodoTarget,
        todo: &NewTodo,
    ) -> Result<CreatedTodo, TriageError>;

    /// Subscribes people to a recording (e.g. a freshly created to-do).
    async fn add_subscribers(
        &self,
        project_id: &str,
        recording_id: u64,
        person_ids: &[u64],
    ) -> Result<(), TriageError>;

    /// Lists every person visible to the account.
    async fn list_people(&self) -> Result<Vec<Person>, TriageError>;
}
