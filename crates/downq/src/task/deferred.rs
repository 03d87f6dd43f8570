// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delayed re-entry of a task through the defer timer.

use super::Task;
use crate::error::Result;
use crate::reactor::ReactorContext;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Wraps another task and hands it to the timer thread, which feeds it back
/// into the command channel once the delay lapses. The inner task therefore
/// re-enters through the ordinary dispatch path instead of running on the
/// timer thread.
#[derive(Debug)]
pub struct DeferredTask {
    delay: Duration,
    inner: Box<Task>,
}

impl DeferredTask {
    #[must_use]
    pub fn new(delay: Duration, inner: Task) -> Self {
        Self {
            delay,
            inner: Box::new(inner),
        }
    }

    pub(crate) fn run(self, ctx: &ReactorContext) -> Result<()> {
        log::trace!(
            "[TIMER] deferring {} task for {:?}",
            self.inner.kind(),
            self.delay
        );
        ctx.metrics
            .deferred_scheduled
            .fetch_add(1, Ordering::Relaxed);
        ctx.submit_after(self.delay, *self.inner)
    }
}
