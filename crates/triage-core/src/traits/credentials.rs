// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential persistence and bearer token supply for the ticketing service.

use async_trait::async_trait;

use crate::error::TriageError;
use crate::types::CredentialRecord;

/// Durable storage for the ticketing credential.
///
/// A missing store is not an error: `load` returns the fallback record if one
/// is configured, `None` otherwise.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<CredentialRecord>, TriageError>;

    async fn save(&self, record: &CredentialRecord) -> Result<(), TriageError>;
}

/// Supplies bearer tokens for ticketing calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns a token to attach to the next request. `force_refresh` asks
    /// the source to obtain a new token even if the current one looks valid.
    async fn access_token(&self, force_refresh: bool) -> Result<String, TriageError>;

    /// Whether a forced refresh can actually produce a different token.
    fn can_refresh(&self) -> bool;
}
