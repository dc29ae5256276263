// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Basecamp 3 adapter for the Triage bridge.
//!
//! - [`credentials`]: JSON file store for the OAuth credential.
//! - [`oauth`]: Launchpad token endpoint (refresh and code exchange).
//! - [`token`]: token lifecycle manager implementing [`triage_core::TokenSource`].
//! - [`client`]: API client implementing [`triage_core::TicketingService`].

pub mod client;
pub mod credentials;
pub mod oauth;
pub mod token;

pub use client::BasecampClient;
pub use credentials::FileCredentialStore;
pub use oauth::{LaunchpadClient, TokenGrant};
pub use token::{StaticToken, TokenManager};
