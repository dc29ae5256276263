// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack adapter for the Triage bridge.
//!
//! [`SlackClient`] implements [`triage_core::ChatService`] over the Web API;
//! [`events`] holds the Events API payloads and the `v0` request signature
//! check used by the events endpoint.

pub mod client;
pub mod events;

pub use client::{BotIdentity, SlackClient};
pub use events::{verify_signature, Envelope, Event, ReactionAdded, SignatureError};
