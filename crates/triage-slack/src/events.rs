// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events API payloads and request signature verification.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use triage_core::{ChannelId, MessageId};

type HmacSha256 = Hmac<Sha256>;

/// Requests older (or newer) than this are rejected as replays.
pub const MAX_TIMESTAMP_SKEW_SECS: i64 = 5 * 60;

const SIGNATURE_VERSION: &str = "v0";

/// Why a delivery failed signature verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing or malformed request timestamp")]
    BadTimestamp,
    #[error("request timestamp outside the accepted window")]
    Stale,
    #[error("missing or malformed signature")]
    Malformed,
    #[error("signature does not match")]
    Mismatch,
}

/// Verifies `X-Slack-Signature` over `v0:{timestamp}:{body}`.
pub fn verify_signature(
    signing_secret: &SecretString,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::BadTimestamp)?;
    let skew = now_unix.checked_sub(ts).map(i64::unsigned_abs);
    if skew.is_none_or(|skew| skew > MAX_TIMESTAMP_SKEW_SECS.unsigned_abs()) {
        return Err(SignatureError::Stale);
    }

    let provided = signature
        .strip_prefix("v0=")
        .and_then(|hex_sig| hex::decode(hex_sig).ok())
        .ok_or(SignatureError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(signing_secret.expose_secret().as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.trim().as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

/// Top-level Events API delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Endpoint ownership check sent when the request URL is configured.
    UrlVerification { challenge: String },
    EventCallback {
        event: Event,
        #[serde(default)]
        event_id: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// Inner event of an `event_callback`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ReactionAdded(ReactionAdded),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionAdded {
    #[serde(default)]
    pub user: Option<String>,
    pub reaction: String,
    pub item: ReactionItem,
}

/// What the reaction was added to.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

impl ReactionAdded {
    /// Channel and message this reaction triggers on, if it is the trigger
    /// emoji on a message with a known location.
    pub fn trigger_target(&self, trigger_emoji: &str) -> Option<(ChannelId, MessageId)> {
        if self.reaction != trigger_emoji || self.item.kind != "message" {
            return None;
        }
        let channel = self.item.channel.as_deref().filter(|c| !c.is_empty())?;
        let ts = self.item.ts.as_deref().filter(|t| !t.is_empty())?;
        Some((ChannelId(channel.to_string()), MessageId(ts.to_string())))
    }
}
