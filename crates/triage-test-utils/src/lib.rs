// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Triage integration tests.
//!
//! Provides in-memory service adapters with scripted failures and captured
//! calls, so the pipeline can be exercised without Slack, OpenAI, or
//! Basecamp.
//!
//! # Components
//!
//! - [`MockChat`] - thread store with captured posts and updates
//! - [`MockExtraction`] - scripted completion replies
//! - [`MockTicketing`] - captured to-dos and subscriptions, fixed people list

pub mod mock_chat;
pub mod mock_extraction;
pub mod mock_ticketing;

pub use mock_chat::{bot_message, user_message, MockChat, MOCK_BOT_ID};
pub use mock_extraction::MockExtraction;
pub use mock_ticketing::MockTicketing;
