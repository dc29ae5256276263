// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread transcript for the extraction prompt.

use std::collections::HashMap;

use tracing::debug;
use triage_core::{ChatService, ThreadMessage, UserId};

/// Human messages of a thread, rendered for the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// `[speaker]: text` blocks separated by blank lines.
    pub text: String,
    /// Distinct authors in order of first appearance; the first is the reporter.
    pub participants: Vec<UserId>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Author of the first human message.
    pub fn reporter(&self) -> Option<&UserId> {
        self.participants.first()
    }
}

/// Builds the transcript from messages that have both an author and text.
/// Bot posts are skipped even when they carry a user.
///
/// Names come from one user lookup per author; a failed lookup falls back to
/// the raw user id.
pub async fn build_transcript(chat: &dyn ChatService, messages: &[ThreadMessage]) -> Transcript {
    let human: Vec<(&UserId, &str)> = messages
        .iter()
        .filter(|m| m.bot_id.is_none())
        .filter_map(|m| {
            let user = m.user.as_ref()?;
            (!m.text.trim().is_empty()).then_some((user, m.text.as_str()))
        })
        .collect();

    let mut participants: Vec<UserId> = Vec::new();
    for (user, _) in &human {
        if !participants.contains(user) {
            participants.push((*user).clone());
        }
    }

    let mut names: HashMap<UserId, String> = HashMap::new();
    for user in &participants {
        let name = match chat.user_info(user).await {
            Ok(info) => info.display_name,
            Err(err) => {
                debug!(user = %user, error = %err, "user lookup failed, using id");
                user.0.clone()
            }
        };
        names.insert(user.clone(), name);
    }

    let text = human
        .iter()
        .map(|(user, text)| {
            let who = names.get(*user).map(String::as_str).unwrap_or(&user.0);
            format!("[{who}]: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    Transcript { text, participants }
}
