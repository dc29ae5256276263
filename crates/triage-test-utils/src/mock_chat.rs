// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat service for deterministic testing.
//!
//! `MockChat` keeps one thread in memory. Replies posted through it are
//! appended to the thread as bot messages, so lookups of the bot's last
//! reply see them just like on a real workspace.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use triage_core::{
    ChannelId, ChatService, ChatUser, MessageId, ThreadMessage, TriageError, UserId,
};

/// Bot identity stamped on replies posted through [`MockChat`].
pub const MOCK_BOT_ID: &str = "BMOCK";

/// A thread message written by a person.
pub fn user_message(ts: &str, user: &str, text: &str) -> ThreadMessage {
    ThreadMessage {
        id: MessageId(ts.to_string()),
        user: Some(UserId(user.to_string())),
        bot_id: None,
        text: text.to_string(),
    }
}

/// A thread message written by a bot.
pub fn bot_message(ts: &str, bot_id: &str, text: &str) -> ThreadMessage {
    ThreadMessage {
        id: MessageId(ts.to_string()),
        user: None,
        bot_id: Some(bot_id.to_string()),
        text: text.to_string(),
    }
}

#[derive(Default)]
struct Failures {
    thread_reads: bool,
    posts: bool,
    permalink: bool,
    all_updates: bool,
    updates: HashSet<String>,
}

/// A mock chat workspace holding a single thread.
pub struct MockChat {
    thread: Mutex<Vec<ThreadMessage>>,
    users: Mutex<HashMap<String, ChatUser>>,
    permalink: Mutex<Option<String>>,
    failures: Mutex<Failures>,
    posts: Mutex<Vec<(MessageId, String)>>,
    updates: Mutex<Vec<(MessageId, String)>>,
    next_ts: Mutex<u64>,
}

impl MockChat {
    /// Create a mock with an empty thread.
    pub fn new() -> Self {
        Self {
            thread: Mutex::new(Vec::new()),
            users: Mutex::new(HashMap::new()),
            permalink: Mutex::new(None),
            failures: Mutex::new(Failures::default()),
            posts: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            next_ts: Mutex::new(1),
        }
    }

    /// Create a mock pre-loaded with thread messages, parent first.
    pub fn with_thread(messages: Vec<ThreadMessage>) -> Self {
        Self {
            thread: Mutex::new(messages),
            ..Self::new()
        }
    }

    /// Register a user profile for `user_info`.
    pub async fn add_user(&self, id: &str, display_name: &str, email: Option<&str>) {
        self.users.lock().await.insert(
            id.to_string(),
            ChatUser {
                id: UserId(id.to_string()),
                display_name: display_name.to_string(),
                email: email.map(str::to_string),
            },
        );
    }

    pub async fn set_permalink(&self, link: &str) {
        *self.permalink.lock().await = Some(link.to_string());
    }

    /// Make `update_message` fail for one message id.
    pub async fn fail_update_of(&self, message: &str) {
        self.failures.lock().await.updates.insert(message.to_string());
    }

    /// Make every `update_message` fail.
    pub async fn fail_all_updates(&self) {
        self.failures.lock().await.all_updates = true;
    }

    pub async fn fail_posts(&self) {
        self.failures.lock().await.posts = true;
    }

    pub async fn fail_thread_reads(&self) {
        self.failures.lock().await.thread_reads = true;
    }

    pub async fn fail_permalink(&self) {
        self.failures.lock().await.permalink = true;
    }

    /// Replies posted so far, as (new message id, text).
    pub async fn posts(&self) -> Vec<(MessageId, String)> {
        self.posts.lock().await.clone()
    }

    /// Successful updates so far, as (message id, text).
    pub async fn updates(&self) -> Vec<(MessageId, String)> {
        self.updates.lock().await.clone()
    }

    /// Current text of a message in the thread.
    pub async fn text_of(&self, message: &MessageId) -> Option<String> {
        self.thread
            .lock()
            .await
            .iter()
            .find(|m| &m.id == message)
            .map(|m| m.text.clone())
    }

    /// Every bot-authored message in the thread.
    pub async fn bot_messages(&self) -> Vec<ThreadMessage> {
        self.thread
            .lock()
            .await
            .iter()
            .filter(|m| m.bot_id.is_some())
            .cloned()
            .collect()
    }
}

impl Default for MockChat {
    fn default() -> Self {
        Self::new()
    }
}

fn chat_error(message: &str) -> TriageError {
    TriageError::Chat {
        message: message.to_string(),
        source: None,
    }
}

#[async_trait]
impl ChatService for MockChat {
    async fn thread_messages(
        &self,
        _channel: &ChannelId,
        _thread: &MessageId,
        limit: usize,
    ) -> Result<Vec<ThreadMessage>, TriageError> {
        if self.failures.lock().await.thread_reads {
            return Err(chat_error("conversations.replies failed: ratelimited"));
        }
        let thread = self.thread.lock().await;
        Ok(thread.iter().take(limit).cloned().collect())
    }

    async fn post_reply(
        &self,
        _channel: &ChannelId,
        _thread: &MessageId,
        text: &str,
    ) -> Result<MessageId, TriageError> {
        if self.failures.lock().await.posts {
            return Err(chat_error("chat.postMessage failed: channel_not_found"));
        }
        let id = {
            let mut next = self.next_ts.lock().await;
            let id = MessageId(format!("9000.{:04}", *next));
            *next += 1;
            id
        };
        self.thread
            .lock()
            .await
            .push(bot_message(&id.0, MOCK_BOT_ID, text));
        self.posts.lock().await.push((id.clone(), text.to_string()));
        Ok(id)
    }

    async fn update_message(
        &self,
        _channel: &ChannelId,
        message: &MessageId,
        text: &str,
    ) -> Result<(), TriageError> {
        {
            let failures = self.failures.lock().await;
            if failures.all_updates || failures.updates.contains(&message.0) {
                return Err(chat_error("chat.update failed: cant_update_message"));
            }
        }
        let mut thread = self.thread.lock().await;
        let Some(existing) = thread.iter_mut().find(|m| &m.id == message) else {
            return Err(chat_error("chat.update failed: message_not_found"));
        };
        existing.text = text.to_string();
        self.updates
            .lock()
            .await
            .push((message.clone(), text.to_string()));
        Ok(())
    }

    async fn user_info(&self, user: &UserId) -> Result<ChatUser, TriageError> {
        self.users
            .lock()
            .await
            .get(&user.0)
            .cloned()
            .ok_or_else(|| chat_error("users.info failed: user_not_found"))
    }

    async fn permalink(
        &self,
        _channel: &ChannelId,
        _message: &MessageId,
    ) -> Result<Option<String>, TriageError> {
        if self.failures.lock().await.permalink {
            return Err(chat_error("chat.getPermalink failed: internal_error"));
        }
        Ok(self.permalink.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (ChannelId, MessageId) {
        (ChannelId("C1".into()), MessageId("100.1".into()))
    }

    #[tokio::test]
    async fn posted_replies_join_the_thread_as_bot_messages() {
        let chat = MockChat::with_thread(vec![user_message("100.1", "U1", "broken")]);
        let (channel, thread) = ids();

        let id = chat.post_reply(&channel, &thread, "working").await.unwrap();
        let messages = chat.thread_messages(&channel, &thread, 50).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].id, id);
        assert_eq!(messages[1].bot_id.as_deref(), Some(MOCK_BOT_ID));
    }

    #[tokio::test]
    async fn scripted_update_failure_leaves_text_unchanged() {
        let chat = MockChat::with_thread(vec![bot_message("1.0", MOCK_BOT_ID, "old")]);
        let (channel, _) = ids();
        let target = MessageId("1.0".into());
        chat.fail_update_of("1.0").await;

        assert!(chat.update_message(&channel, &target, "new").await.is_err());
        assert_eq!(chat.text_of(&target).await.as_deref(), Some("old"));
        assert!(chat.updates().await.is_empty());
    }
}
