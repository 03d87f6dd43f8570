// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-peer queue removal.

use super::{ResponseDeliveryTask, Task};
use crate::error::Result;
use crate::reactor::ReactorContext;
use crate::request::{Peer, RequestState};
use std::sync::atomic::Ordering;

/// Drops everything queued for one peer, typically on deregistration.
/// Requests that never reached `Executed` fail over to their error
/// callback with `Cancelled`; executed ones already delivered and are
/// discarded silently.
#[derive(Debug)]
pub struct PurgeTask {
    peer: Peer,
}

impl PurgeTask {
    #[must_use]
    pub fn new(peer: Peer) -> Self {
        Self { peer }
    }

    pub(crate) fn run(self, ctx: &ReactorContext) -> Result<()> {
        let drained = ctx.queue.purge(&self.peer);
        if drained.is_empty() {
            return Ok(());
        }
        log::debug!(
            "[QUEUE] purged {} request(s) for {}",
            drained.len(),
            self.peer
        );
        for request in drained {
            if request.state == RequestState::Executed {
                continue;
            }
            ctx.metrics.requests_cancelled.fetch_add(1, Ordering::Relaxed);
            ctx.submit(Task::ResponseDelivery(ResponseDeliveryTask::cancelled(
                request.response_id,
            )))?;
        }
        Ok(())
    }
}
