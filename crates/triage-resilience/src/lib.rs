// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives guarding the extraction service.
//!
//! - [`AdmissionController`]: per-minute sliding window plus a consecutive
//!   failure circuit breaker, consulted before every extraction call.
//! - [`call_with_retry`]: bounded exponential backoff for rate-limited calls,
//!   driven by the pure [`classify`] function.

pub mod admission;
pub mod retry;

pub use admission::{Admission, AdmissionController, AdmissionPolicy, RefusalReason};
pub use retry::{call_with_retry, classify, FailureKind, RetryPolicy};
