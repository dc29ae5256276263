// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry with exponential backoff for extraction calls.
//!
//! Classification is a pure function over [`TriageError`] so it can be tested
//! without timers; [`call_with_retry`] only decides whether and how long to
//! wait.

use std::future::Future;
use std::time::Duration;

use strum::Display;
use tracing::{debug, warn};
use triage_core::TriageError;

/// Error codes that mean the account has no allowance left.
const QUOTA_CODES: &[&str] = &["insufficient_quota", "billing_hard_limit_reached"];

/// How a failed extraction call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// No allowance left; retrying cannot help.
    QuotaExhausted,
    /// Transient throttling; retry after a backoff.
    RateLimited,
    /// Anything else; propagate immediately.
    Other,
}

/// Classify an extraction failure.
pub fn classify(err: &TriageError) -> FailureKind {
    match err {
        TriageError::QuotaExhausted { .. } => FailureKind::QuotaExhausted,
        TriageError::RateLimited { .. } => FailureKind::RateLimited,
        TriageError::Provider { status, code, .. } => {
            let code = code.as_deref();
            if code.is_some_and(|c| QUOTA_CODES.contains(&c)) {
                FailureKind::QuotaExhausted
            } else if *status == Some(429) || code == Some("rate_limit_exceeded") {
                FailureKind::RateLimited
            } else {
                FailureKind::Other
            }
        }
        _ => FailureKind::Other,
    }
}

/// Attempt bound and backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Wait after the first failed attempt; doubles after each further one.
    pub initial_backoff: Duration,
    /// Ceiling applied to server-supplied `Retry-After` hints.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_secs(2),
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt number `attempt` (1-based).
    ///
    /// A server hint replaces the computed backoff, capped at `max_retry_after`.
    pub fn backoff(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.min(self.max_retry_after),
            None => {
                let exponent = attempt.saturating_sub(1).min(16);
                self.initial_backoff.saturating_mul(1 << exponent)
            }
        }
    }
}

/// Runs `op` until it succeeds, fails terminally, or attempts run out.
///
/// `op` receives the 1-based attempt number. Quota exhaustion becomes
/// [`TriageError::QuotaExhausted`] without retrying; exhausting attempts while
/// still rate limited becomes [`TriageError::RateLimited`] carrying the last
/// error's message; other failures are returned unchanged.
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, TriageError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TriageError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "extraction call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        match classify(&err) {
            FailureKind::QuotaExhausted => {
                warn!(attempt, error = %err, "extraction quota exhausted, not retrying");
                return Err(into_quota_exhausted(err));
            }
            FailureKind::Other => return Err(err),
            FailureKind::RateLimited if attempt >= max_attempts => {
                warn!(attempts = attempt, error = %err, "extraction still rate limited, giving up");
                return Err(into_rate_limited(err));
            }
            FailureKind::RateLimited => {
                let delay = policy.backoff(attempt, retry_after_hint(&err));
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "extraction rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn retry_after_hint(err: &TriageError) -> Option<Duration> {
    match err {
        TriageError::Provider { retry_after, .. } | TriageError::RateLimited { retry_after, .. } => {
            *retry_after
        }
        _ => None,
    }
}

fn into_quota_exhausted(err: TriageError) -> TriageError {
    match err {
        TriageError::Provider { message, .. } => TriageError::QuotaExhausted { message },
        other => other,
    }
}

fn into_rate_limited(err: TriageError) -> TriageError {
    match err {
        TriageError::Provider {
            message,
            retry_after,
            ..
        } => TriageError::RateLimited {
            message,
            retry_after,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn provider_error(status: u16, code: Option<&str>, retry_after: Option<Duration>) -> TriageError {
        TriageError::Provider {
            status: Some(status),
            code: code.map(str::to_string),
            message: format!("status {status}"),
            retry_after,
        }
    }

    #[test]
    fn classifies_quota_before_rate_limit() {
        assert_eq!(
            classify(&provider_error(429, Some("insufficient_quota"), None)),
            FailureKind::QuotaExhausted
        );
        assert_eq!(
            classify(&provider_error(429, Some("rate_limit_exceeded"), None)),
            FailureKind::RateLimited
        );
        assert_eq!(classify(&provider_error(429, None, None)), FailureKind::RateLimited);
        assert_eq!(classify(&provider_error(400, None, None)), FailureKind::Other);
        assert_eq!(classify(&provider_error(500, None, None)), FailureKind::Other);
        assert_eq!(
            classify(&TriageError::Internal("x".into())),
            FailureKind::Other
        );
    }

    #[test]
    fn backoff_doubles_and_hint_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1, None), Duration::from_secs(2));
        assert_eq!(policy.backoff(2, None), Duration::from_secs(4));
        assert_eq!(policy.backoff(3, None), Duration::from_secs(8));
        assert_eq!(
            policy.backoff(1, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.backoff(3, Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fourth_attempt_with_growing_delays() {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&starts);

        let result = call_with_retry(&RetryPolicy::default(), |attempt| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().unwrap().push(Instant::now());
                if attempt < 4 {
                    Err(provider_error(429, Some("rate_limit_exceeded"), None))
                } else {
                    Ok("extracted")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "extracted");
        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 4);
        let gaps: Vec<Duration> = starts.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps.windows(2).all(|w| w[1] > w[0]), "gaps: {gaps:?}");
        assert!(gaps[0] >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_exhaustion_makes_one_attempt() {
        let mut calls = 0;
        let result: Result<(), _> = call_with_retry(&RetryPolicy::default(), |_| {
            calls += 1;
            async { Err(provider_error(429, Some("insufficient_quota"), None)) }
        })
        .await;

        assert_eq!(calls, 1);
        assert!(matches!(result, Err(TriageError::QuotaExhausted { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = call_with_retry(&RetryPolicy::default(), |_| {
            calls += 1;
            async { Err(provider_error(401, Some("invalid_api_key"), None)) }
        })
        .await;

        assert_eq!(calls, 1);
        assert!(matches!(result, Err(TriageError::Provider { status: Some(401), .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_surface_rate_limited() {
        let mut calls = 0;
        let result: Result<(), _> = call_with_retry(&RetryPolicy::default(), |_| {
            calls += 1;
            async { Err(provider_error(429, None, Some(Duration::from_secs(1)))) }
        })
        .await;

        assert_eq!(calls, 4);
        match result {
            Err(TriageError::RateLimited { retry_after, .. }) => {
                assert_eq!(retry_after, Some(Duration::from_secs(1)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn server_hint_overrides_computed_backoff() {
        let start = Instant::now();
        let result = call_with_retry(&RetryPolicy::default(), |attempt| async move {
            if attempt == 1 {
                Err(provider_error(429, None, Some(Duration::from_secs(90))))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(60) && waited < Duration::from_secs(61));
    }
}
