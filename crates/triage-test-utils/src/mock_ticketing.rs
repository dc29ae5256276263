// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock ticketing service capturing created to-dos and subscriptions.

use async_trait::async_trait;
use tokio::sync::Mutex;

use triage_core::{CreatedTodo, NewTodo, Person, TicketingService, TodoTarget, TriageError};

#[derive(Default)]
struct State {
    people: Vec<Person>,
    created: Vec<(TodoTarget, NewTodo)>,
    subscriptions: Vec<(String, u64, Vec<u64>)>,
    people_calls: usize,
    fail_create: Option<u16>,
    fail_subscribe: bool,
    fail_people: bool,
}

pub struct MockTicketing {
    account_id: String,
    state: Mutex<State>,
}

impl MockTicketing {
    pub fn new() -> Self {
        Self {
            account_id: "mock-account".to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Create a mock whose `list_people` returns `people`.
    pub fn with_people(people: Vec<Person>) -> Self {
        Self {
            account_id: "mock-account".to_string(),
            state: Mutex::new(State {
                people,
                ..State::default()
            }),
        }
    }

    /// Convenience constructor for a person entry.
    pub fn person(id: u64, name: &str, email: &str, sgid: Option<&str>) -> Person {
        Person {
            id,
            name: Some(name.to_string()),
            email_address: Some(email.to_string()),
            attachable_sgid: sgid.map(str::to_string),
        }
    }

    /// Make `create_todo` answer with the given HTTP status.
    pub async fn fail_create_with(&self, status: u16) {
        self.state.lock().await.fail_create = Some(status);
    }

    pub async fn fail_subscribe(&self) {
        self.state.lock().await.fail_subscribe = true;
    }

    pub async fn fail_people(&self) {
        self.state.lock().await.fail_people = true;
    }

    /// To-dos created so far with their target list.
    pub async fn created(&self) -> Vec<(TodoTarget, NewTodo)> {
        self.state.lock().await.created.clone()
    }

    /// Subscription changes as (project id, recording id, person ids).
    pub async fn subscriptions(&self) -> Vec<(String, u64, Vec<u64>)> {
        self.state.lock().await.subscriptions.clone()
    }

    pub async fn people_calls(&self) -> usize {
        self.state.lock().await.people_calls
    }
}

impl Default for MockTicketing {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketingService for MockTicketing {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    async fn create_todo(
        &self,
        target: &TodoTarget,
        todo: &NewTodo,
    ) -> Result<CreatedTodo, TriageError> {
        let mut state = self.state.lock().await;
        if let Some(status) = state.fail_create {
            return Err(TriageError::RemoteService {
                service: "basecamp",
                status,
                body: "mock failure".into(),
            });
        }
        state.created.push((target.clone(), todo.clone()));
        let id = 1000 + state.created.len() as u64;
        Ok(CreatedTodo {
            id,
            app_url: format!(
                "https://3.basecamp.com/{}/buckets/{}/todos/{id}",
                self.account_id, target.project_id
            ),
        })
    }

    async fn add_subscribers(
        &self,
        project_id: &str,
        recording_id: u64,
        person_ids: &[u64],
    ) -> Result<(), TriageError> {
        let mut state = self.state.lock().await;
        if state.fail_subscribe {
            return Err(TriageError::RemoteService {
                service: "basecamp",
                status: 403,
                body: "mock failure".into(),
            });
        }
        state
            .subscriptions
            .push((project_id.to_string(), recording_id, person_ids.to_vec()));
        Ok(())
    }

    async fn list_people(&self) -> Result<Vec<Person>, TriageError> {
        let mut state = self.state.lock().await;
        state.people_calls += 1;
        if state.fail_people {
            return Err(TriageError::RemoteService {
                service: "basecamp",
                status: 500,
                body: "mock failure".into(),
            });
        }
        Ok(state.people.clone())
    }
}
