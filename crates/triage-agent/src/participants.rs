// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Matching chat users to ticketing people by email.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};
use triage_core::{ChatService, Person, TicketingService, TriageError, UserId};

/// Name used in a mention when neither side knows one.
const UNKNOWN_NAME: &str = "Someone";

/// Reporter resolved to a ticketing person who can be mentioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterMention {
    pub person_id: u64,
    pub sgid: String,
    pub name: String,
}

/// People of the ticketing account, fetched once per account and kept for
/// the life of the process.
pub struct PeopleDirectory {
    ticketing: Arc<dyn TicketingService>,
    cache: Mutex<HashMap<String, Arc<Vec<Person>>>>,
}

impl PeopleDirectory {
    pub fn new(ticketing: Arc<dyn TicketingService>) -> Self {
        Self {
            ticketing,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Every person of the account. The lock is held across the fetch so
    /// concurrent first calls list people once.
    pub async fn people(&self) -> Result<Arc<Vec<Person>>, TriageError> {
        let account = self.ticketing.account_id().to_string();
        let mut cache = self.cache.lock().await;
        if let Some(people) = cache.get(&account) {
            return Ok(Arc::clone(people));
        }
        let people = Arc::new(self.ticketing.list_people().await?);
        info!(account = %account, count = people.len(), "cached ticketing people");
        cache.insert(account, Arc::clone(&people));
        Ok(people)
    }

    /// Ticketing ids of the given chat users, in input order without
    /// duplicates. Users without a profile email or without a match are
    /// skipped.
    pub async fn resolve_person_ids(
        &self,
        chat: &dyn ChatService,
        users: &[UserId],
    ) -> Result<Vec<u64>, TriageError> {
        let people = self.people().await?;
        let mut ids = Vec::new();
        for user in users {
            let Some(email) = user_email(chat, user).await else {
                continue;
            };
            match find_by_email(&people, &email) {
                Some(person) if !ids.contains(&person.id) => ids.push(person.id),
                Some(_) => {}
                None => debug!(user = %user, "no ticketing person with this email"),
            }
        }
        Ok(ids)
    }

    /// The reporter as a mentionable person, if their email matches someone
    /// who has a mention reference.
    pub async fn resolve_reporter(
        &self,
        chat: &dyn ChatService,
        user: &UserId,
    ) -> Result<Option<ReporterMention>, TriageError> {
        let info = match chat.user_info(user).await {
            Ok(info) => info,
            Err(err) => {
                debug!(user = %user, error = %err, "reporter lookup failed");
                return Ok(None);
            }
        };
        let Some(email) = info.email.as_deref().map(normalize_email) else {
            return Ok(None);
        };
        let people = self.people().await?;
        let Some(person) = find_by_email(&people, &email) else {
            return Ok(None);
        };
        let Some(sgid) = person.attachable_sgid.clone() else {
            return Ok(None);
        };

        let name = person
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| Some(info.display_name).filter(|n| !n.trim().is_empty()))
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        Ok(Some(ReporterMention {
            person_id: person.id,
            sgid,
            name,
        }))
    }
}

async fn user_email(chat: &dyn ChatService, user: &UserId) -> Option<String> {
    match chat.user_info(user).await {
        Ok(info) => info.email.as_deref().map(normalize_email),
        Err(err) => {
            debug!(user = %user, error = %err, "participant lookup failed");
            None
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn find_by_email<'a>(people: &'a [Person], email: &str) -> Option<&'a Person> {
    if email.is_empty() {
        return None;
    }
    people.iter().find(|p| {
        p.email_address
            .as_deref()
            .is_some_and(|e| normalize_email(e) == email)
    })
}
