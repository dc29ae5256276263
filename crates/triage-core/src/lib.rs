// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Triage bridge.
//!
//! Holds the error taxonomy, the shared domain types, and the traits that
//! the chat, extraction, and ticketing adapters implement. The pipeline only
//! ever talks to these traits.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{truncate_chars, TriageError};
pub use types::{
    ChannelId, ChatUser, CreatedTodo, CredentialRecord, MessageId, NewTodo, Person,
    ThreadMessage, TodoTarget, UserId,
};

pub use traits::{
    ChatService, CompletionRequest, CredentialStore, ExtractionService, TicketingService,
    TokenSource,
};
