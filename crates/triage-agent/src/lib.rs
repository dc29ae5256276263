// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reaction pipeline for the Triage bridge.
//!
//! Turns one trigger reaction into a Basecamp to-do: reads the thread,
//! gates and runs extraction, enriches the description, files the to-do,
//! and keeps a single status message in the thread up to date.

pub mod bindings;
pub mod enrich;
pub mod participants;
pub mod pipeline;
pub mod status;
pub mod transcript;

pub use bindings::{BindingMap, ChannelBindings};
pub use participants::{PeopleDirectory, ReporterMention};
pub use pipeline::{Outcome, Pipeline, PipelineSettings, THREAD_LIMIT};
pub use status::{ProgressHandle, StatusReporter, Strategy};
pub use transcript::{build_transcript, Transcript};
