// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reactor counters for observability.
//!
//! All fields use relaxed atomics; consumers only need monotonic snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct ReactorMetrics {
    /// Non-blocking tasks run inline on the dispatch thread.
    pub tasks_inline: AtomicU64,
    /// Blocking tasks handed to the worker pool.
    pub tasks_offloaded: AtomicU64,
    /// Tasks that aborted with an error (invariant faults included).
    pub tasks_failed: AtomicU64,
    /// Delivery attempts started.
    pub sends_attempted: AtomicU64,
    /// Attempts that saw no response within the timeout.
    pub sends_deferred: AtomicU64,
    /// Attempts that ended in a terminal delivery error.
    pub sends_errored: AtomicU64,
    /// Responses handed to a caller's success callback.
    pub responses_delivered: AtomicU64,
    /// Requests discarded because a time budget lapsed.
    pub requests_expired: AtomicU64,
    /// Requests discarded by an explicit purge.
    pub requests_cancelled: AtomicU64,
    /// Tasks routed through the defer timer.
    pub deferred_scheduled: AtomicU64,
}

impl ReactorMetrics {
    /// Create a zeroed metrics struct ready for concurrent updates.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks_inline: AtomicU64::new(0),
            tasks_offloaded: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            sends_attempted: AtomicU64::new(0),
            sends_deferred: AtomicU64::new(0),
            sends_errored: AtomicU64::new(0),
            responses_delivered: AtomicU64::new(0),
            requests_expired: AtomicU64::new(0),
            requests_cancelled: AtomicU64::new(0),
            deferred_scheduled: AtomicU64::new(0),
        }
    }

    /// Current counter values without synchronisation penalties.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_inline: self.tasks_inline.load(Ordering::Relaxed),
            tasks_offloaded: self.tasks_offloaded.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            sends_attempted: self.sends_attempted.load(Ordering::Relaxed),
            sends_deferred: self.sends_deferred.load(Ordering::Relaxed),
            sends_errored: self.sends_errored.load(Ordering::Relaxed),
            responses_delivered: self.responses_delivered.load(Ordering::Relaxed),
            requests_expired: self.requests_expired.load(Ordering::Relaxed),
            requests_cancelled: self.requests_cancelled.load(Ordering::Relaxed),
            deferred_scheduled: self.deferred_scheduled.load(Ordering::Relaxed),
        }
    }
}

impl Default for ReactorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ReactorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tasks_inline: u64,
    pub tasks_offloaded: u64,
    pub tasks_failed: u64,
    pub sends_attempted: u64,
    pub sends_deferred: u64,
    pub sends_errored: u64,
    pub responses_delivered: u64,
    pub requests_expired: u64,
    pub requests_cancelled: u64,
    pub deferred_scheduled: u64,
}
