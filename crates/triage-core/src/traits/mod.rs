// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service traits for the external collaborators of the pipeline.
//!
//! All traits use `#[async_trait]` so adapters can be held as trait objects.

pub mod chat;
pub mod credentials;
pub mod extraction;
pub mod ticketing;

pub use chat::ChatService;
pub use credentials::{CredentialStore, TokenSource};
pub use extraction::{CompletionRequest, ExtractionService};
pub use ticketing::TicketingService;
