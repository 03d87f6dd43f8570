// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-peer queue walk: expiration, deferral and send dispatch.

use super::{DeferredTask, ResponseDeliveryTask, SendingTask, Task};
use crate::error::{DownqError, Result};
use crate::reactor::ReactorContext;
use crate::request::{Peer, RequestState};
use dashmap::mapref::entry::Entry;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Walks one peer's queue front to back and decides, per request, whether
/// it expires, defers, or becomes the next downlink attempt.
///
/// Runs inline on the dispatch thread and applies its state edges directly,
/// so no two walks (or walks and edges) ever interleave. That is what keeps
/// at most one request per peer in `Processing` at a time.
///
/// A walk that leaves work behind arms a timer-driven revisit through the
/// per-peer `armed_walks` table: at most one revisit is outstanding per
/// peer, and re-arming only ever moves its fire time earlier.
#[derive(Debug)]
pub struct ProcessingTask {
    peer: Peer,
    may_attempt_send: bool,
    rearming: bool,
}

impl ProcessingTask {
    #[must_use]
    pub fn new(peer: Peer, may_attempt_send: bool) -> Self {
        Self {
            peer,
            may_attempt_send,
            rearming: false,
        }
    }

    /// The timer-driven revisit walk. Never attempts a send; releases its
    /// `armed_walks` slot when it runs.
    pub(crate) fn revisit(peer: Peer) -> Self {
        Self {
            peer,
            may_attempt_send: false,
            rearming: true,
        }
    }

    #[must_use]
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub(crate) fn run(self, ctx: &ReactorContext) -> Result<()> {
        let now = Instant::now();
        if self.rearming {
            ctx.armed_walks.remove(&self.peer);
        }
        // One send per walk, and none while an attempt is already in flight.
        let mut can_send = self.may_attempt_send;
        let mut blocked = false;
        let mut in_flight = false;
        // Earliest keep deadline among entries only the timer will collect.
        let mut next_deadline: Option<Instant> = None;

        for request in ctx.queue.requests_for(&self.peer) {
            match request.state {
                RequestState::Enqueued | RequestState::Deferred => {
                    // Keep budget dominates the send window: a request past
                    // its keep deadline is discarded even if the window
                    // alone would still allow a send.
                    if request.keep_budget_over(now) {
                        self.expire(ctx, &request)?;
                        continue;
                    }
                    if request.send_window_over(now) {
                        log::debug!(
                            "[QUEUE] {} on {}: send window elapsed",
                            request.request_id,
                            self.peer
                        );
                        ctx.queue.transition(
                            &self.peer,
                            request.request_id,
                            RequestState::TtlElapsed,
                        )?;
                        // The parked request still owes its caller the
                        // expiry callback at the keep deadline.
                        next_deadline = earliest(next_deadline, request.keep_deadline);
                        continue;
                    }
                    if can_send {
                        ctx.queue.transition(
                            &self.peer,
                            request.request_id,
                            RequestState::Processing,
                        )?;
                        ctx.submit(Task::Sending(SendingTask::new(&request, ctx)))?;
                        // The completion of this attempt re-triggers the
                        // walk; the rest of the queue waits until then.
                        return Ok(());
                    }
                    blocked = true;
                }
                RequestState::TtlElapsed => {
                    if request.keep_budget_over(now) {
                        self.expire(ctx, &request)?;
                    } else {
                        next_deadline = earliest(next_deadline, request.keep_deadline);
                    }
                }
                RequestState::Executed => {
                    // Response already delivered; the entry lingers only to
                    // absorb duplicate responses until its keep deadline.
                    if request.keep_budget_over(now) {
                        ctx.queue.transition(
                            &self.peer,
                            request.request_id,
                            RequestState::Unknown,
                        )?;
                    } else {
                        next_deadline = earliest(next_deadline, request.keep_deadline);
                    }
                }
                RequestState::Processing => {
                    // An attempt is in flight; its completion owns the next
                    // walk. No second send until then.
                    can_send = false;
                    in_flight = true;
                }
                RequestState::Unknown => {
                    return Err(DownqError::QueueCorrupted {
                        peer: self.peer.endpoint().to_string(),
                        id: request.request_id,
                        state: request.state,
                    });
                }
            }
        }

        // A send-less walk repolls skipped pending work after the defer
        // period; that is the chain that keeps a sleeping peer's queue
        // moving without an external trigger. A walk entered on a send
        // opportunity does not: the attempt it could not start is owned by
        // the in-flight completion. Lingering entries are collected at
        // their known deadline instead of the polling cadence.
        let mut delay = None;
        if (blocked || in_flight) && !self.may_attempt_send {
            delay = Some(ctx.config.defer_period);
        }
        if let Some(deadline) = next_deadline {
            let until = deadline.saturating_duration_since(now);
            delay = Some(delay.map_or(until, |d: Duration| d.min(until)));
        }
        match delay {
            Some(delay) => self.arm(ctx, now, delay),
            None => Ok(()),
        }
    }

    /// Arm the peer's revisit walk to fire after `delay`, unless one is
    /// already armed at least as early.
    fn arm(&self, ctx: &ReactorContext, now: Instant, delay: Duration) -> Result<()> {
        let due = now + delay;
        let already_armed = match ctx.armed_walks.entry(self.peer.clone()) {
            Entry::Occupied(mut armed) => {
                if *armed.get() <= due {
                    true
                } else {
                    armed.insert(due);
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(due);
                false
            }
        };
        if already_armed {
            return Ok(());
        }
        ctx.submit(Task::Deferred(DeferredTask::new(
            delay,
            Task::Processing(ProcessingTask::revisit(self.peer.clone())),
        )))
    }

    fn expire(&self, ctx: &ReactorContext, request: &crate::request::QueueRequest) -> Result<()> {
        log::debug!(
            "[QUEUE] {} on {}: keep budget elapsed, discarding",
            request.request_id,
            self.peer
        );
        ctx.queue
            .transition(&self.peer, request.request_id, RequestState::Unknown)?;
        ctx.metrics.requests_expired.fetch_add(1, Ordering::Relaxed);
        ctx.submit(Task::ResponseDelivery(ResponseDeliveryTask::expired(
            request.response_id,
        )))
    }
}

fn earliest(current: Option<Instant>, candidate: Instant) -> Option<Instant> {
    Some(current.map_or(candidate, |c| c.min(candidate)))
}
