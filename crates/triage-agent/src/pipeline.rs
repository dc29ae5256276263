// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reaction pipeline: thread → extraction → to-do → status reply.
//!
//! One call to [`Pipeline::handle_reaction`] processes one trigger event.
//! Every terminal state ends with a status text in the thread, written
//! through the [`StatusReporter`].

use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};
use triage_core::{
    truncate_chars, ChannelId, ChatService, ExtractionService, MessageId, NewTodo,
    TicketingService, TodoTarget, TriageError,
};
use triage_openai::{extract_issue, IssueDraft};
use triage_resilience::{Admission, AdmissionController, RefusalReason, RetryPolicy};

use crate::bindings::ChannelBindings;
use crate::enrich::{link_permalink, mention_reporter};
use crate::participants::PeopleDirectory;
use crate::status::{ProgressHandle, StatusReporter};
use crate::transcript::{build_transcript, Transcript};

/// Thread messages read for one extraction.
pub const THREAD_LIMIT: usize = 200;

/// Characters of an error message shown in the thread.
const ERROR_DISPLAY_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub working_message: String,
    pub extraction_prompt: String,
    /// List used when the channel has no binding.
    pub default_target: Option<TodoTarget>,
    pub add_participants_as_subscribers: bool,
    /// This bot's identity, used to find its earlier replies.
    pub bot_id: Option<String>,
}

/// Terminal state of one trigger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { todo_id: u64, url: String },
    EmptyThread,
    Refused {
        reason: RefusalReason,
        retry_after_secs: u64,
    },
    Failed(String),
}

impl Outcome {
    /// Text left in the thread for this outcome.
    pub fn status_text(&self) -> String {
        match self {
            Outcome::Created { url, .. } => format!("Issue was extracted to Basecamp: {url}"),
            Outcome::EmptyThread => "Could not read thread messages.".to_string(),
            Outcome::Refused {
                reason: RefusalReason::RateLimited,
                retry_after_secs,
            } => format!("Too many extraction requests; try again in {retry_after_secs}s."),
            Outcome::Refused {
                reason: RefusalReason::CircuitOpen,
                retry_after_secs,
            } => format!(
                "Extraction temporarily paused after repeated failures. Try again in {retry_after_secs}s."
            ),
            Outcome::Failed(message) => format!("Failed to extract to Basecamp: {message}"),
        }
    }
}

pub struct Pipeline {
    chat: Arc<dyn ChatService>,
    extraction: Arc<dyn ExtractionService>,
    ticketing: Arc<dyn TicketingService>,
    admission: Arc<AdmissionController>,
    retry: RetryPolicy,
    settings: PipelineSettings,
    status: StatusReporter,
    people: PeopleDirectory,
    bindings: Option<ChannelBindings>,
}

impl Pipeline {
    pub fn new(
        chat: Arc<dyn ChatService>,
        extraction: Arc<dyn ExtractionService>,
        ticketing: Arc<dyn TicketingService>,
        admission: Arc<AdmissionController>,
        retry: RetryPolicy,
        settings: PipelineSettings,
    ) -> Self {
        let status = StatusReporter::new(Arc::clone(&chat), settings.bot_id.clone());
        let people = PeopleDirectory::new(Arc::clone(&ticketing));
        Self {
            chat,
            extraction,
            ticketing,
            admission,
            retry,
            settings,
            status,
            people,
            bindings: None,
        }
    }

    /// Routes channels with a binding to their own to-do list.
    pub fn with_bindings(mut self, bindings: ChannelBindings) -> Self {
        self.bindings = Some(bindings);
        self
    }

    /// Processes one trigger reaction on `thread`. Never fails: errors end
    /// as [`Outcome::Failed`] with a failure text in the thread.
    pub async fn handle_reaction(&self, channel: ChannelId, thread: MessageId) -> Outcome {
        let span = info_span!("reaction", channel = %channel, thread = %thread);
        self.run(channel, thread).instrument(span).await
    }

    async fn run(&self, channel: ChannelId, thread: MessageId) -> Outcome {
        let mut handle = ProgressHandle::new(channel, thread);
        if let Err(err) = self
            .status
            .start(&mut handle, &self.settings.working_message)
            .await
        {
            warn!(error = %err, "could not post working message");
        }

        let outcome = match self.process(&handle).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "extraction to Basecamp failed");
                Outcome::Failed(truncate_chars(&err.to_string(), ERROR_DISPLAY_CHARS).to_string())
            }
        };

        match &outcome {
            Outcome::Created { todo_id, url } => info!(todo_id, url = %url, "to-do created"),
            Outcome::Refused {
                reason,
                retry_after_secs,
            } => info!(%reason, retry_after_secs, "extraction refused"),
            Outcome::EmptyThread => info!("thread has no readable messages"),
            Outcome::Failed(_) => {}
        }

        if let Err(err) = self.status.report(&mut handle, &outcome.status_text()).await {
            error!(error = %err, "could not post final status");
        }
        outcome
    }

    async fn process(&self, handle: &ProgressHandle) -> Result<Outcome, TriageError> {
        let messages = self
            .chat
            .thread_messages(&handle.channel, &handle.thread, THREAD_LIMIT)
            .await?;
        let transcript = build_transcript(self.chat.as_ref(), &messages).await;
        if transcript.is_empty() {
            return Ok(Outcome::EmptyThread);
        }

        let target = self.target_for(&handle.channel).await?;

        if let Admission::Refused {
            reason,
            retry_after_secs,
        } = self.admission.allow()
        {
            return Ok(Outcome::Refused {
                reason,
                retry_after_secs,
            });
        }

        let draft = match extract_issue(
            self.extraction.as_ref(),
            &self.retry,
            &self.settings.extraction_prompt,
            &transcript.text,
        )
        .await
        {
            Ok(draft) => {
                self.admission.record_success();
                draft
            }
            Err(err) => {
                self.admission.record_failure();
                return Err(err);
            }
        };

        let subscribers = if self.settings.add_participants_as_subscribers {
            match self
                .people
                .resolve_person_ids(self.chat.as_ref(), &transcript.participants)
                .await
            {
                Ok(ids) => ids,
                Err(err) => {
                    warn!(error = %err, "could not resolve participants");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let description = self.enrich_description(handle, &transcript, &draft).await;
        let todo = self
            .ticketing
            .create_todo(
                &target,
                &NewTodo {
                    content: draft.title,
                    description,
                },
            )
            .await?;

        if !subscribers.is_empty() {
            if let Err(err) = self
                .ticketing
                .add_subscribers(&target.project_id, todo.id, &subscribers)
                .await
            {
                warn!(todo_id = todo.id, error = %err, "could not add subscribers");
            }
        }

        Ok(Outcome::Created {
            todo_id: todo.id,
            url: todo.app_url,
        })
    }

    /// Binding for the channel, else the configured default list.
    async fn target_for(&self, channel: &ChannelId) -> Result<TodoTarget, TriageError> {
        if let Some(bindings) = &self.bindings {
            if let Some(target) = bindings.get(channel).await {
                return Ok(target);
            }
        }
        self.settings.default_target.clone().ok_or_else(|| {
            TriageError::Config(format!(
                "no Basecamp to-do list for channel {channel}; bind one with `triage bind`"
            ))
        })
    }

    /// Mentions the reporter and links the thread. Lookup failures leave
    /// the description as extracted.
    async fn enrich_description(
        &self,
        handle: &ProgressHandle,
        transcript: &Transcript,
        draft: &IssueDraft,
    ) -> String {
        let mut description = draft.description.clone();

        if let Some(reporter) = transcript.reporter() {
            match self.people.resolve_reporter(self.chat.as_ref(), reporter).await {
                Ok(Some(mention)) => {
                    description = mention_reporter(&description, &mention.sgid, &mention.name);
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "could not resolve reporter"),
            }
        }

        match self.chat.permalink(&handle.channel, &handle.thread).await {
            Ok(Some(link)) => description = link_permalink(&description, &link),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "could not fetch thread permalink"),
        }

        description
    }
}
