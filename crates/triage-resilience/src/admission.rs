// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission gate for extraction calls: sliding-window throttle plus circuit breaker.
//!
//! This is a failsafe against runaway triggering (an event source
//! re-delivering the same reaction, a loop in a workflow), not a cost
//! accountant. One controller is built at startup and shared by `Arc`.
//!
//! ## Concurrency
//!
//! Each call to [`AdmissionController::allow`] or the `record_*` methods is
//! atomic, but admission and outcome reporting are separate steps. Calls
//! admitted just before the circuit opens still run and report, and a
//! failure reported after the cooldown can reopen the circuit immediately
//! because the failure streak only resets on success.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use strum::{Display, EnumString};
use tracing::{debug, warn};

/// Length of the sliding rate window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Thresholds for the admission gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Calls admitted per [`WINDOW`].
    pub max_per_minute: u32,
    /// Consecutive failures that open the circuit.
    pub circuit_failures: u32,
    /// How long the circuit stays open.
    pub circuit_cooldown: Duration,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            max_per_minute: 15,
            circuit_failures: 5,
            circuit_cooldown: Duration::from_secs(120),
        }
    }
}

/// Why a call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RefusalReason {
    /// The per-minute window is full.
    RateLimited,
    /// Too many consecutive failures; cooling down.
    CircuitOpen,
}

/// Outcome of an admission check. Refusal is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Refused {
        reason: RefusalReason,
        retry_after_secs: u64,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

#[derive(Debug, Default)]
struct AdmissionState {
    recent: VecDeque<Instant>,
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Process-wide admission gate for the extraction service.
#[derive(Debug)]
pub struct AdmissionController {
    policy: AdmissionPolicy,
    state: Mutex<AdmissionState>,
}

impl AdmissionController {
    pub fn new(policy: AdmissionPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(AdmissionState::default()),
        }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Decides whether an extraction call may start now.
    ///
    /// An admitted call takes a window slot immediately; the caller must then
    /// report exactly one of [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn allow(&self) -> Admission {
        self.allow_at(Instant::now())
    }

    /// [`allow`](Self::allow) against an explicit clock reading.
    pub fn allow_at(&self, now: Instant) -> Admission {
        let mut state = self.lock();

        if let Some(until) = state.open_until {
            if now < until {
                return Admission::Refused {
                    reason: RefusalReason::CircuitOpen,
                    retry_after_secs: ceil_secs(until - now),
                };
            }
            debug!("extraction circuit cooldown elapsed");
            state.open_until = None;
        }

        while let Some(&oldest) = state.recent.front() {
            if now.saturating_duration_since(oldest) >= WINDOW {
                state.recent.pop_front();
            } else {
                break;
            }
        }

        if state.recent.len() >= self.policy.max_per_minute as usize {
            let oldest = state.recent.front().copied().unwrap_or(now);
            let wait = (oldest + WINDOW).saturating_duration_since(now);
            return Admission::Refused {
                reason: RefusalReason::RateLimited,
                retry_after_secs: ceil_secs(wait),
            };
        }

        state.recent.push_back(now);
        Admission::Allowed
    }

    /// Reports a successful admitted call; clears the failure streak.
    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Reports a failed admitted call; opens the circuit at the threshold.
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    /// [`record_failure`](Self::record_failure) against an explicit clock reading.
    pub fn record_failure_at(&self, now: Instant) {
        let mut state = self.lock();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.policy.circuit_failures {
            state.open_until = Some(now + self.policy.circuit_cooldown);
            warn!(
                failures = state.consecutive_failures,
                cooldown_secs = self.policy.circuit_cooldown.as_secs(),
                "extraction circuit breaker open"
            );
        }
    }

    /// Current consecutive failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn lock(&self) -> MutexGuard<'_, AdmissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(AdmissionPolicy::default())
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_millis().div_ceil(1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(max: u32, failures: u32, cooldown_secs: u64) -> AdmissionController {
        AdmissionController::new(AdmissionPolicy {
            max_per_minute: max,
            circuit_failures: failures,
            circuit_cooldown: Duration::from_secs(cooldown_secs),
        })
    }

    #[test]
    fn nth_plus_one_call_in_window_is_rate_limited() {
        let gate = controller(3, 5, 120);
        let t0 = Instant::now();
        for i in 0..3 {
            assert!(gate.allow_at(t0 + Duration::from_secs(i)).is_allowed());
        }
        let refused = gate.allow_at(t0 + Duration::from_secs(10));
        assert_eq!(
            refused,
            Admission::Refused {
                reason: RefusalReason::RateLimited,
                retry_after_secs: 50,
            }
        );
    }

    #[test]
    fn slot_frees_when_oldest_leaves_window() {
        let gate = controller(2, 5, 120);
        let t0 = Instant::now();
        assert!(gate.allow_at(t0).is_allowed());
        assert!(gate.allow_at(t0 + Duration::from_secs(30)).is_allowed());
        assert!(!gate.allow_at(t0 + Duration::from_secs(59)).is_allowed());
        assert!(gate.allow_at(t0 + Duration::from_secs(60)).is_allowed());
        // The second admission (t0 + 30s) is still inside the window.
        assert!(!gate.allow_at(t0 + Duration::from_secs(61)).is_allowed());
    }

    #[test]
    fn refused_calls_do_not_take_slots() {
        let gate = controller(1, 5, 120);
        let t0 = Instant::now();
        assert!(gate.allow_at(t0).is_allowed());
        for i in 1..10 {
            assert!(!gate.allow_at(t0 + Duration::from_secs(i)).is_allowed());
        }
        assert!(gate.allow_at(t0 + Duration::from_secs(60)).is_allowed());
    }

    #[test]
    fn circuit_opens_after_threshold_failures() {
        let gate = controller(100, 3, 120);
        let t0 = Instant::now();
        for _ in 0..3 {
            assert!(gate.allow_at(t0).is_allowed());
            gate.record_failure_at(t0);
        }
        assert_eq!(
            gate.allow_at(t0),
            Admission::Refused {
                reason: RefusalReason::CircuitOpen,
                retry_after_secs: 120,
            }
        );
        match gate.allow_at(t0 + Duration::from_millis(100_500)) {
            Admission::Refused {
                reason: RefusalReason::CircuitOpen,
                retry_after_secs,
            } => assert_eq!(retry_after_secs, 20),
            other => panic!("expected open circuit, got {other:?}"),
        }
    }

    #[test]
    fn open_circuit_wins_over_free_window_and_takes_no_slot() {
        let gate = controller(1, 1, 30);
        let t0 = Instant::now();
        gate.record_failure_at(t0);
        for i in 0..5 {
            let outcome = gate.allow_at(t0 + Duration::from_secs(i));
            assert!(matches!(
                outcome,
                Admission::Refused {
                    reason: RefusalReason::CircuitOpen,
                    ..
                }
            ));
        }
        // Cooldown over: the single window slot is still free.
        assert!(gate.allow_at(t0 + Duration::from_secs(30)).is_allowed());
    }

    #[test]
    fn success_before_threshold_resets_streak() {
        let gate = controller(100, 3, 120);
        let t0 = Instant::now();
        gate.record_failure_at(t0);
        gate.record_failure_at(t0);
        gate.record_success();
        assert_eq!(gate.consecutive_failures(), 0);
        gate.record_failure_at(t0);
        gate.record_failure_at(t0);
        assert!(gate.allow_at(t0).is_allowed());
    }

    #[test]
    fn refusal_reason_renders_snake_case() {
        assert_eq!(RefusalReason::RateLimited.to_string(), "rate_limited");
        assert_eq!(RefusalReason::CircuitOpen.to_string(), "circuit_open");
    }
}
