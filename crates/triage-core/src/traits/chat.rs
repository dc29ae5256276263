// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat workspace surface used by the pipeline and the status reporter.

use async_trait::async_trait;

use crate::error::TriageError;
use crate::types::{ChannelId, ChatUser, MessageId, ThreadMessage, UserId};

/// Thread read, message post/update, and user lookup on the chat workspace.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Returns up to `limit` messages of a thread in chronological order,
    /// parent message first.
    async fn thread_messages(
        &self,
        channel: &ChannelId,
        thread: &MessageId,
        limit: usize,
    ) -> Result<Vec<ThreadMessage>, TriageError>;

    /// Posts a reply into a thread and returns the new message's identifier.
    async fn post_reply(
        &self,
        channel: &ChannelId,
        thread: &MessageId,
        text: &str,
    ) -> Result<MessageId, TriageError>;

    /// Overwrites the text of an existing message.
    async fn update_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        text: &str,
    ) -> Result<(), TriageError>;

    /// Looks up a user's display name and email.
    async fn user_info(&self, user: &UserId) -> Result<ChatUser, TriageError>;

    /// Returns a permanent link to a message, if the workspace provides one.
    async fn permalink(
        &self,
        channel: &ChannelId,
        message: &MessageId,
    ) -> Result<Option<String>, TriageError>;
}
