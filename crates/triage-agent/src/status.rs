// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Edit-in-place status reporting for one trigger event.
//!
//! A run owns one progress message in the thread. Each report tries, in
//! order, to edit that message, to edit the bot's latest reply in the
//! thread, and finally to post a new reply. The first strategy that works
//! decides which message the handle points at from then on.

use std::sync::Arc;

use strum::Display;
use tracing::{debug, warn};
use triage_core::{ChannelId, ChatService, MessageId, TriageError};

/// Thread replies scanned when looking for the bot's last reply.
pub const LOOKBACK: usize = 50;

/// Ways of getting a status text into the thread, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    UpdateCurrent,
    UpdateLastBotReply,
    PostNew,
}

const STRATEGIES: [Strategy; 3] = [
    Strategy::UpdateCurrent,
    Strategy::UpdateLastBotReply,
    Strategy::PostNew,
];

/// The single mutable status message of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressHandle {
    pub channel: ChannelId,
    pub thread: MessageId,
    pub current_message_id: Option<MessageId>,
}

impl ProgressHandle {
    pub fn new(channel: ChannelId, thread: MessageId) -> Self {
        Self {
            channel,
            thread,
            current_message_id: None,
        }
    }
}

/// Writes status texts through the chat service with cascading fallbacks.
pub struct StatusReporter {
    chat: Arc<dyn ChatService>,
    bot_id: Option<String>,
}

impl StatusReporter {
    /// `bot_id` identifies this bot's replies. When unknown, any bot reply
    /// is taken as ours.
    pub fn new(chat: Arc<dyn ChatService>, bot_id: Option<String>) -> Self {
        Self { chat, bot_id }
    }

    /// Posts the first progress message of a run.
    pub async fn start(&self, handle: &mut ProgressHandle, text: &str) -> Result<(), TriageError> {
        let id = self
            .chat
            .post_reply(&handle.channel, &handle.thread, text)
            .await?;
        debug!(message = %id, "posted progress message");
        handle.current_message_id = Some(id);
        Ok(())
    }

    /// Shows `text` as the run's status.
    ///
    /// Only the last strategy's failure is returned, as
    /// [`TriageError::StatusReportFailed`].
    pub async fn report(&self, handle: &mut ProgressHandle, text: &str) -> Result<(), TriageError> {
        for strategy in STRATEGIES {
            match self.attempt(strategy, handle, text).await {
                Ok(Some(id)) => {
                    if handle.current_message_id.as_ref() != Some(&id) {
                        debug!(%strategy, message = %id, "status now tracked on a different message");
                    }
                    handle.current_message_id = Some(id);
                    return Ok(());
                }
                Ok(None) => continue,
                Err(err) if strategy == Strategy::PostNew => {
                    return Err(TriageError::StatusReportFailed {
                        message: format!("could not post status reply: {err}"),
                        source: Some(Box::new(err)),
                    });
                }
                Err(err) => {
                    warn!(%strategy, error = %err, "status strategy failed, falling back");
                }
            }
        }
        Err(TriageError::StatusReportFailed {
            message: "no status strategy applied".into(),
            source: None,
        })
    }

    /// Runs one strategy. `Ok(None)` means the strategy does not apply.
    async fn attempt(
        &self,
        strategy: Strategy,
        handle: &ProgressHandle,
        text: &str,
    ) -> Result<Option<MessageId>, TriageError> {
        match strategy {
            Strategy::UpdateCurrent => {
                let Some(current) = &handle.current_message_id else {
                    return Ok(None);
                };
                self.chat
                    .update_message(&handle.channel, current, text)
                    .await?;
                Ok(Some(current.clone()))
            }
            Strategy::UpdateLastBotReply => {
                let Some(last) = self.last_bot_reply(handle).await? else {
                    return Ok(None);
                };
                self.chat.update_message(&handle.channel, &last, text).await?;
                Ok(Some(last))
            }
            Strategy::PostNew => {
                let id = self
                    .chat
                    .post_reply(&handle.channel, &handle.thread, text)
                    .await?;
                Ok(Some(id))
            }
        }
    }

    /// Newest reply in the thread authored by this bot. The thread root is
    /// never considered.
    async fn last_bot_reply(&self, handle: &ProgressHandle) -> Result<Option<MessageId>, TriageError> {
        let messages = self
            .chat
            .thread_messages(&handle.channel, &handle.thread, LOOKBACK)
            .await?;

        Ok(messages
            .into_iter()
            .rev()
            .filter(|m| m.id != handle.thread)
            .find(|m| match (&self.bot_id, &m.bot_id) {
                (Some(ours), Some(author)) => ours == author,
                (None, Some(_)) => true,
                (_, None) => false,
            })
            .map(|m| m.id))
    }
}
