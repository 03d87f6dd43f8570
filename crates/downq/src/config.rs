// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Queue core configuration.
//!
//! Plain struct with sane defaults; every knob can be overridden through a
//! `DOWNQ_*` environment variable for deployments that cannot touch the
//! hosting server's construction code.

use crate::error::{DownqError, Result};
use std::time::Duration;

/// Period after which a sleeping peer's queue is re-checked for garbage
/// collection when no external trigger arrives.
pub const DEFAULT_DEFER_PERIOD: Duration = Duration::from_secs(30);

/// How long a single delivery attempt waits for the peer's answer.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default send window: one day.
pub const DEFAULT_SEND_BUDGET: Duration = Duration::from_secs(24 * 60 * 60);

/// Default keep budget (overall TTL): two days.
pub const DEFAULT_KEEP_BUDGET: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Tunables of the reactor and the retry/defer/expire policy.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Worker pool size for blocking tasks. Default: available hardware
    /// parallelism.
    pub workers: usize,
    /// Delay before a deferred processing pass re-checks a sleeping peer.
    pub defer_period: Duration,
    /// Per-attempt timeout handed to the downlink sender.
    pub attempt_timeout: Duration,
    /// Send window applied when the caller does not pass one.
    pub send_budget: Duration,
    /// Keep budget applied when the caller does not pass one.
    pub keep_budget: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            defer_period: DEFAULT_DEFER_PERIOD,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            send_budget: DEFAULT_SEND_BUDGET,
            keep_budget: DEFAULT_KEEP_BUDGET,
        }
    }
}

impl QueueConfig {
    /// Defaults with `DOWNQ_*` environment overrides applied:
    /// `DOWNQ_WORKERS`, `DOWNQ_DEFER_PERIOD_MS`, `DOWNQ_ATTEMPT_TIMEOUT_MS`,
    /// `DOWNQ_SEND_BUDGET_MS`, `DOWNQ_KEEP_BUDGET_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: env_usize("DOWNQ_WORKERS", defaults.workers),
            defer_period: env_duration_ms("DOWNQ_DEFER_PERIOD_MS", defaults.defer_period),
            attempt_timeout: env_duration_ms("DOWNQ_ATTEMPT_TIMEOUT_MS", defaults.attempt_timeout),
            send_budget: env_duration_ms("DOWNQ_SEND_BUDGET_MS", defaults.send_budget),
            keep_budget: env_duration_ms("DOWNQ_KEEP_BUDGET_MS", defaults.keep_budget),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_defer_period(mut self, period: Duration) -> Self {
        self.defer_period = period;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_budgets(mut self, send: Duration, keep: Duration) -> Self {
        self.send_budget = send;
        self.keep_budget = keep;
        self
    }

    /// Reject configurations the reactor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DownqError::InvalidConfig("workers must be >= 1".into()));
        }
        if self.defer_period.is_zero() {
            return Err(DownqError::InvalidConfig(
                "defer_period must be non-zero".into(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(DownqError::InvalidConfig(
                "attempt_timeout must be non-zero".into(),
            ));
        }
        if self.keep_budget < self.send_budget {
            log::warn!(
                "[CONFIG] keep_budget {:?} < send_budget {:?}; requests will expire before their send window closes",
                self.keep_budget,
                self.send_budget
            );
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("[CONFIG] ignoring {name}='{raw}' (not a number)");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_duration_ms(name: &str, default: Duration) -> Duration {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                log::warn!("[CONFIG] ignoring {name}='{raw}' (not a millisecond count)");
                default
            }
        },
        Err(_) => default,
    }
}
